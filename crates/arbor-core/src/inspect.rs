//! Read-only views of the instance tree for debugging and devtools.

use crate::hooks::HookMeta;
use crate::instance::InstanceId;
use crate::tree::Tree;

/// A point-in-time copy of one instance and its structural children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceSnapshot {
    pub id: InstanceId,
    pub name: &'static str,
    pub identity: Option<String>,
    pub lifetime: &'static str,
    pub visible: bool,
    pub renders: usize,
    pub hooks: Vec<HookMeta>,
    pub children: Vec<InstanceSnapshot>,
}

impl InstanceSnapshot {
    /// Depth-first search by component name.
    pub fn find(&self, name: &str) -> Option<&InstanceSnapshot> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Number of instances in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(InstanceSnapshot::count).sum::<usize>()
    }
}

impl Tree {
    pub(crate) fn snapshot(&self, id: InstanceId) -> Option<InstanceSnapshot> {
        let instance = self.instances.get(id)?;
        let (hooks, renders) = instance
            .frame
            .as_ref()
            .map(|frame| (frame.hook_meta(), frame.render_count))
            .unwrap_or_default();
        Some(InstanceSnapshot {
            id,
            name: instance.name(),
            identity: instance.identity.as_ref().map(ToString::to_string),
            lifetime: instance.lifetime.label(),
            visible: instance.visible,
            renders,
            hooks,
            children: instance
                .children
                .iter()
                .filter_map(|child| self.snapshot(*child))
                .collect(),
        })
    }
}
