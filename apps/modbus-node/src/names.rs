// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Host identity answers for LLMNR/NBNS queries and DHCP registration.
// Author: Lukas Bower

//! Local name resolution hook.

use crate::config::NodeNames;

/// Outcome of a local name query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// The query names this node.
    Match,
    /// The query names some other host.
    NoMatch,
}

impl NameMatch {
    /// Whether the stack should answer the query.
    #[must_use]
    pub const fn is_match(self) -> bool {
        matches!(self, NameMatch::Match)
    }
}

/// Hook a network stack calls to decide whether a queried name is this node.
pub trait NameResolver: Send + Sync {
    /// Compare `name` against the node's names.
    fn resolve_local_name(&self, name: &str) -> NameMatch;

    /// Name registered with DHCP.
    fn hostname(&self) -> &str;
}

impl NameResolver for NodeNames {
    fn resolve_local_name(&self, name: &str) -> NameMatch {
        if name.eq_ignore_ascii_case(self.hostname) || name.eq_ignore_ascii_case(self.nickname) {
            NameMatch::Match
        } else {
            NameMatch::NoMatch
        }
    }

    fn hostname(&self) -> &str {
        self.hostname
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_both_names_ignoring_case() {
        let names = NodeNames::default();
        assert!(names.resolve_local_name("RTOSDemo").is_match());
        assert!(names.resolve_local_name("rtosdemo").is_match());
        assert!(names.resolve_local_name("WINDOWS_DEMO").is_match());
        assert_eq!(names.resolve_local_name("other"), NameMatch::NoMatch);
    }

    #[test]
    fn rejects_prefixes_and_empty_names() {
        let names = NodeNames::default();
        assert_eq!(names.resolve_local_name("RTOS"), NameMatch::NoMatch);
        assert_eq!(names.resolve_local_name("RTOSDemo1"), NameMatch::NoMatch);
        assert_eq!(names.resolve_local_name(""), NameMatch::NoMatch);
        assert_eq!(names.hostname(), "RTOSDemo");
    }
}
