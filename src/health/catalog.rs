//! Monitored services

/// How a service is monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Reported in the upstream status document, aggregated under one gate key
    Game,
    /// Probed directly, one gate key per endpoint
    Endpoint,
}

/// A monitored service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Short reference used by the dashboard and user reports
    pub reference: &'static str,
    /// Display name, also the source name stored in events
    pub name: &'static str,
    /// Upstream node (game services) or endpoint identifier
    pub node: &'static str,
    /// Monitoring kind
    pub kind: ServiceKind,
}

/// Every service shown on the dashboard
pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        reference: "h2pc",
        name: "HITMAN 2 PC",
        node: "pc2-service.hitman.io",
        kind: ServiceKind::Game,
    },
    CatalogEntry {
        reference: "h2xb",
        name: "HITMAN 2 XBOX ONE",
        node: "xboxone2-service.hitman.io",
        kind: ServiceKind::Game,
    },
    CatalogEntry {
        reference: "h2ps",
        name: "HITMAN 2 PS4",
        node: "ps42-service.hitman.io",
        kind: ServiceKind::Game,
    },
    CatalogEntry {
        reference: "h1pc",
        name: "HITMAN PC",
        node: "pc-service.hitman.io",
        kind: ServiceKind::Game,
    },
    CatalogEntry {
        reference: "h1xb",
        name: "HITMAN XBOX ONE",
        node: "xboxone-service.hitman.io",
        kind: ServiceKind::Game,
    },
    CatalogEntry {
        reference: "h1ps",
        name: "HITMAN PS4",
        node: "ps4-service.hitman.io",
        kind: ServiceKind::Game,
    },
    CatalogEntry {
        reference: "auth",
        name: "HITMAN AUTHENTICATION",
        node: "auth.hitman.io",
        kind: ServiceKind::Endpoint,
    },
    CatalogEntry {
        reference: "hmfc",
        name: "HITMAN FORUM",
        node: "hitmanforum",
        kind: ServiceKind::Endpoint,
    },
];

/// Look up a service by its short reference
pub fn by_reference(reference: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.reference == reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::KeyTable;
    use std::collections::HashSet;

    #[test]
    fn test_references_unique() {
        let refs: HashSet<_> = CATALOG.iter().map(|e| e.reference).collect();
        assert_eq!(refs.len(), CATALOG.len());
    }

    #[test]
    fn test_endpoints_have_gate_keys() {
        let table = KeyTable::standard();
        for entry in CATALOG.iter().filter(|e| e.kind == ServiceKind::Endpoint) {
            assert!(
                table.iter().any(|(logical, _)| logical == entry.name),
                "{} has no gate key",
                entry.name
            );
        }
    }

    #[test]
    fn test_by_reference() {
        assert_eq!(by_reference("h1ps").unwrap().name, "HITMAN PS4");
        assert!(by_reference("h3pc").is_none());
    }
}
