/*
 * Type hierarchy collaborator
 *
 * Read-only view of the program's nominal type hierarchy, consumed by
 * analysis problems that reason about virtual dispatch (e.g. to narrow a
 * callee set or to model vtable loads). The solver itself never queries it;
 * it is part of the engine boundary so problems can be written against a
 * stable interface.
 */

use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Query surface over a nominal type hierarchy with virtual-function tables.
pub trait TypeHierarchy {
    /// Opaque type identity.
    type Ty: Clone + Eq + Hash + Debug;

    /// Opaque function identity (matches the ICFG's function type).
    type Fun: Clone + Eq + Hash + Debug;

    fn has_vftable(&self, ty: &Self::Ty) -> bool;

    /// Virtual-function table in slot order; empty when the type has none.
    fn vftable_of(&self, ty: &Self::Ty) -> Vec<Self::Fun>;

    /// Reflexive-transitive subtype check.
    fn is_subtype(&self, sub: &Self::Ty, sup: &Self::Ty) -> bool;
}

/// In-memory type hierarchy with explicit registration.
pub struct ProgramTypeHierarchy<T, F> {
    supertypes: FxHashMap<T, Vec<T>>,
    vftables: FxHashMap<T, Vec<F>>,
}

impl<T: Clone + Eq + Hash + Debug, F: Clone + Eq + Hash + Debug> ProgramTypeHierarchy<T, F> {
    pub fn new() -> Self {
        Self {
            supertypes: FxHashMap::default(),
            vftables: FxHashMap::default(),
        }
    }

    pub fn add_type(&mut self, ty: T) {
        self.supertypes.entry(ty).or_default();
    }

    /// Record `sub <: sup` (direct edge).
    pub fn add_subtype(&mut self, sub: T, sup: T) {
        self.supertypes.entry(sub).or_default().push(sup.clone());
        self.supertypes.entry(sup).or_default();
    }

    pub fn set_vftable(&mut self, ty: T, table: Vec<F>) {
        self.vftables.insert(ty, table);
    }
}

impl<T: Clone + Eq + Hash + Debug, F: Clone + Eq + Hash + Debug> Default
    for ProgramTypeHierarchy<T, F>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash + Debug, F: Clone + Eq + Hash + Debug> TypeHierarchy
    for ProgramTypeHierarchy<T, F>
{
    type Ty = T;
    type Fun = F;

    fn has_vftable(&self, ty: &T) -> bool {
        self.vftables.get(ty).is_some_and(|t| !t.is_empty())
    }

    fn vftable_of(&self, ty: &T) -> Vec<F> {
        self.vftables.get(ty).cloned().unwrap_or_default()
    }

    fn is_subtype(&self, sub: &T, sup: &T) -> bool {
        if sub == sup {
            return true;
        }
        // Upward DFS over direct supertype edges.
        let mut stack: Vec<&T> = vec![sub];
        let mut seen: Vec<&T> = Vec::new();
        while let Some(ty) = stack.pop() {
            if seen.contains(&ty) {
                continue;
            }
            seen.push(ty);
            if let Some(ups) = self.supertypes.get(ty) {
                for up in ups {
                    if up == sup {
                        return true;
                    }
                    stack.push(up);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> ProgramTypeHierarchy<&'static str, &'static str> {
        // Base <- Left, Right <- Derived
        let mut h = ProgramTypeHierarchy::new();
        h.add_subtype("Left", "Base");
        h.add_subtype("Right", "Base");
        h.add_subtype("Derived", "Left");
        h.add_subtype("Derived", "Right");
        h
    }

    #[test]
    fn test_subtype_is_reflexive() {
        let h = diamond();
        assert!(h.is_subtype(&"Base", &"Base"));
    }

    #[test]
    fn test_subtype_is_transitive() {
        let h = diamond();
        assert!(h.is_subtype(&"Derived", &"Base"));
        assert!(h.is_subtype(&"Left", &"Base"));
        assert!(!h.is_subtype(&"Base", &"Derived"));
        assert!(!h.is_subtype(&"Left", &"Right"));
    }

    #[test]
    fn test_vftable_lookup() {
        let mut h = diamond();
        h.set_vftable("Base", vec!["Base::draw"]);
        h.set_vftable("Derived", vec!["Derived::draw"]);
        assert!(h.has_vftable(&"Base"));
        assert!(!h.has_vftable(&"Left"));
        assert_eq!(h.vftable_of(&"Derived"), vec!["Derived::draw"]);
        assert!(h.vftable_of(&"Right").is_empty());
    }
}
