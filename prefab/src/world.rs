//! Component storage for loaded prefab graphs.
//!
//! A [`World`] owns every component instance created while loading a
//! prefab (including components of nested prefabs). Graph edges are plain
//! [`ComponentId`] handles stored in reference members, so a component can
//! be referenced before it has been filled in.

use std::fmt;

use crate::component::Component;

/// Handle to a component stored in a [`World`].
///
/// Ids are arena indices, stable for the lifetime of the world. The only
/// component ever dropped early is the spawn of a failed edit, whose id is
/// never handed out.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

impl ComponentId {
    /// Returns the arena index of this component.
    pub fn index(&self) -> u32 {
        self.0
    }

    pub(crate) fn from_index(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arena of type-erased components.
///
/// # Example
///
/// ```ignore
/// let mut world = World::new();
/// let door = world.spawn(Box::new(Door::default()));
/// assert_eq!(world.get(door).unwrap().component_name(), "Door");
/// ```
#[derive(Default)]
pub struct World {
    components: Vec<Box<dyn Component>>,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a component and return its handle.
    pub fn spawn(&mut self, component: Box<dyn Component>) -> ComponentId {
        let id = ComponentId(self.components.len() as u32);
        self.components.push(component);
        id
    }

    /// Drop `id` if it is the most recently spawned component. Undoes the
    /// spawn of an edit that failed before anything else could be spawned.
    pub(crate) fn despawn_last(&mut self, id: ComponentId) -> bool {
        if id.0 as usize + 1 != self.components.len() {
            return false;
        }
        self.components.pop();
        true
    }

    pub fn get(&self, id: ComponentId) -> Option<&dyn Component> {
        self.components.get(id.0 as usize).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut dyn Component> {
        match self.components.get_mut(id.0 as usize) {
            Some(c) => Some(c.as_mut()),
            None => None,
        }
    }

    /// Borrow a component as its concrete type.
    pub fn get_as<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.get(id)?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow a component as its concrete type.
    pub fn get_as_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Returns the registered type name of a component.
    pub fn type_name(&self, id: ComponentId) -> Option<&'static str> {
        self.get(id).map(|c| c.component_name())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Iterate over all components in spawn order.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &dyn Component)> + '_ {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId(i as u32), c.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, crate::Component)]
    struct Lamp {
        #[value]
        on: bool,
    }

    #[derive(Default, crate::Component)]
    struct Switch {
        #[reference]
        lamp: Option<ComponentId>,
    }

    #[test]
    fn spawn_assigns_sequential_ids() {
        let mut world = World::new();
        let a = world.spawn(Box::new(Lamp::default()));
        let b = world.spawn(Box::new(Switch::default()));
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(world.len(), 2);
        assert_eq!(world.type_name(b), Some("Switch"));
    }

    #[test]
    fn typed_access() {
        let mut world = World::new();
        let lamp = world.spawn(Box::new(Lamp::default()));
        let switch = world.spawn(Box::new(Switch::default()));

        world.get_as_mut::<Switch>(switch).unwrap().lamp = Some(lamp);
        world.get_as_mut::<Lamp>(lamp).unwrap().on = true;

        assert_eq!(world.get_as::<Switch>(switch).unwrap().lamp, Some(lamp));
        assert!(world.get_as::<Lamp>(lamp).unwrap().on);
        assert!(world.get_as::<Lamp>(switch).is_none());
    }

    #[test]
    fn missing_id() {
        let mut world = World::new();
        let id = world.spawn(Box::new(Lamp::default()));
        let other = World::new();
        assert!(other.get(id).is_none());
        assert!(world.get_mut(id).is_some());
    }

    #[test]
    fn despawn_last_only_takes_back_the_newest() {
        let mut world = World::new();
        let lamp = world.spawn(Box::new(Lamp::default()));
        let switch = world.spawn(Box::new(Switch::default()));
        assert!(!world.despawn_last(lamp));
        assert!(world.despawn_last(switch));
        assert_eq!(world.len(), 1);
        assert!(world.get(switch).is_none());
    }

    #[test]
    fn iter_in_spawn_order() {
        let mut world = World::new();
        world.spawn(Box::new(Lamp::default()));
        world.spawn(Box::new(Switch::default()));
        let names: Vec<_> = world.iter().map(|(_, c)| c.component_name()).collect();
        assert_eq!(names, ["Lamp", "Switch"]);
    }
}
