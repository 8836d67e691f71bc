use crate::backend::PortInfo;

/// A switchable physical or virtual connector of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    /// Unique port name, the key used when switching
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Backend-assigned priority, higher is more preferred
    pub priority: u32,
    /// Whether something is currently plugged into the port
    pub available: bool,
}

impl From<PortInfo> for Port {
    fn from(info: PortInfo) -> Self {
        Self {
            name: info.name,
            description: info.description,
            priority: info.priority,
            available: info.available,
        }
    }
}

/// Deterministically ordered set of a stream's ports.
///
/// Ports are kept sorted by priority (descending) and then name (ascending)
/// so that enumeration order is reproducible across snapshots. Lookup is
/// linear; port lists are small.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortRegistry {
    ports: Vec<Port>,
}

impl PortRegistry {
    /// Build a registry from an unordered port list.
    pub fn new(mut ports: Vec<Port>) -> Self {
        ports.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Self { ports }
    }

    /// Ports in registry order.
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Find a port by name.
    pub fn find(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|port| port.name == name)
    }

    /// Number of ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the stream has no ports.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(name: &str, priority: u32) -> Port {
        Port {
            name: name.to_owned(),
            description: String::new(),
            priority,
            available: true,
        }
    }

    #[test]
    fn sorts_by_priority_then_name() {
        let registry = PortRegistry::new(vec![port("Beta", 10), port("Alpha", 10), port("Gamma", 5)]);
        let names: Vec<&str> = registry.ports().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Beta", "Gamma"]);
    }

    #[test]
    fn lookup_by_name() {
        let registry = PortRegistry::new(vec![port("analog-output", 100)]);
        assert!(registry.find("analog-output").is_some());
        assert!(registry.find("hdmi-output").is_none());
    }
}
