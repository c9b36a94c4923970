//! The FIRRTL-flavoured type system.

use firth_utils::Id;
use itertools::Itertools;
use std::rc::Rc;

/// A field of a [bundle type](Type::Bundle).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct BundleField {
    pub name: Id,
    /// Whether the field direction is reversed with respect to the bundle.
    pub flip: bool,
    pub ty: Type,
}

/// A hardware type. Aggregate payloads are shared behind `Rc` so that types
/// clone cheaply.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Type {
    /// Unsigned integer with the given bit width.
    Uint(u32),
    /// Signed integer with the given bit width.
    Sint(u32),
    Clock,
    /// The abstract reset type. Replaced by a concrete type during reset
    /// inference.
    Reset,
    AsyncReset,
    Analog(u32),
    Bundle(Rc<Vec<BundleField>>),
    Vector(Rc<Type>, usize),
}

impl Type {
    pub fn bundle(fields: Vec<BundleField>) -> Self {
        Type::Bundle(Rc::new(fields))
    }

    pub fn vector(element: Type, len: usize) -> Self {
        Type::Vector(Rc::new(element), len)
    }

    /// Whether this is a non-aggregate type.
    pub fn is_ground(&self) -> bool {
        !matches!(self, Type::Bundle(_) | Type::Vector(..))
    }

    /// Whether this type may participate in a reset network: the abstract
    /// reset, an async reset, or a single unsigned bit.
    pub fn is_reset_type(&self) -> bool {
        matches!(self, Type::Reset | Type::AsyncReset | Type::Uint(1))
    }

    /// Whether this is the abstract (uninferred) reset type.
    pub fn is_abstract_reset(&self) -> bool {
        matches!(self, Type::Reset)
    }

    /// The fields of a bundle type.
    pub fn fields(&self) -> &[BundleField] {
        match self {
            Type::Bundle(fields) => fields,
            _ => panic!("fields() on non-bundle type `{self}'"),
        }
    }

    /// The index of the field with the given name, if present.
    pub fn field_index(&self, name: Id) -> Option<usize> {
        self.fields().iter().position(|f| f.name == name)
    }

    /// The element type of a vector type.
    pub fn element(&self) -> &Type {
        match self {
            Type::Vector(elem, _) => elem,
            _ => panic!("element() on non-vector type `{self}'"),
        }
    }

    /// The largest field ID addressing a leaf of this type. Ground types
    /// only contain ID 0.
    pub fn max_field_id(&self) -> u32 {
        match self {
            Type::Bundle(fields) => fields
                .iter()
                .map(|f| f.ty.max_field_id() + 1)
                .sum(),
            Type::Vector(elem, len) => {
                (elem.max_field_id() + 1) * *len as u32
            }
            _ => 0,
        }
    }

    /// The field ID of child `index` relative to this aggregate.
    pub fn field_id(&self, index: usize) -> u32 {
        match self {
            Type::Bundle(fields) => {
                1 + fields[..index]
                    .iter()
                    .map(|f| f.ty.max_field_id() + 1)
                    .sum::<u32>()
            }
            Type::Vector(elem, len) => {
                debug_assert!(index < *len);
                1 + index as u32 * (elem.max_field_id() + 1)
            }
            _ => panic!("field_id() on ground type `{self}'"),
        }
    }

    /// The child index whose ID range contains `field_id`.
    pub fn index_for_field_id(&self, field_id: u32) -> usize {
        debug_assert!(field_id > 0);
        match self {
            Type::Bundle(fields) => {
                let mut id = 1;
                for (index, field) in fields.iter().enumerate() {
                    let next = id + field.ty.max_field_id() + 1;
                    if field_id < next {
                        return index;
                    }
                    id = next;
                }
                panic!("field ID {field_id} out of range for `{self}'")
            }
            Type::Vector(elem, _) => {
                ((field_id - 1) / (elem.max_field_id() + 1)) as usize
            }
            _ => panic!("index_for_field_id() on ground type `{self}'"),
        }
    }

    /// Rebuild this type with the leaf at `field_id` replaced by `leaf`.
    pub fn with_field_type(&self, field_id: u32, leaf: Type) -> Type {
        match self {
            Type::Bundle(fields) => {
                let index = self.index_for_field_id(field_id);
                let mut fields = fields.as_ref().clone();
                fields[index].ty = fields[index]
                    .ty
                    .with_field_type(field_id - self.field_id(index), leaf);
                Type::bundle(fields)
            }
            Type::Vector(elem, len) => {
                let index = self.index_for_field_id(field_id);
                let elem = elem
                    .with_field_type(field_id - self.field_id(index), leaf);
                Type::vector(elem, *len)
            }
            _ => {
                debug_assert!(field_id == 0);
                leaf
            }
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Uint(w) => write!(f, "uint<{w}>"),
            Type::Sint(w) => write!(f, "sint<{w}>"),
            Type::Clock => write!(f, "clock"),
            Type::Reset => write!(f, "reset"),
            Type::AsyncReset => write!(f, "asyncreset"),
            Type::Analog(w) => write!(f, "analog<{w}>"),
            Type::Bundle(fields) => {
                write!(
                    f,
                    "{{{}}}",
                    fields
                        .iter()
                        .map(|field| format!(
                            "{}{}: {}",
                            if field.flip { "flip " } else { "" },
                            field.name,
                            field.ty
                        ))
                        .join(", ")
                )
            }
            Type::Vector(elem, len) => write!(f, "{elem}[{len}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bundle() -> Type {
        // {a: uint<1>, b: {x: reset, y: uint<8>}, c: clock}
        Type::bundle(vec![
            BundleField {
                name: "a".into(),
                flip: false,
                ty: Type::Uint(1),
            },
            BundleField {
                name: "b".into(),
                flip: false,
                ty: Type::bundle(vec![
                    BundleField {
                        name: "x".into(),
                        flip: false,
                        ty: Type::Reset,
                    },
                    BundleField {
                        name: "y".into(),
                        flip: false,
                        ty: Type::Uint(8),
                    },
                ]),
            },
            BundleField {
                name: "c".into(),
                flip: false,
                ty: Type::Clock,
            },
        ])
    }

    #[test]
    fn field_ids_of_nested_bundle() {
        let ty = sample_bundle();
        assert_eq!(ty.max_field_id(), 5);
        assert_eq!(ty.field_id(0), 1);
        assert_eq!(ty.field_id(1), 2);
        assert_eq!(ty.field_id(2), 5);
        // b.x sits at 2 + 1, b.y at 2 + 2.
        assert_eq!(ty.index_for_field_id(3), 1);
        assert_eq!(ty.index_for_field_id(4), 1);
        assert_eq!(ty.index_for_field_id(5), 2);
    }

    #[test]
    fn field_ids_of_vector() {
        let ty = Type::vector(sample_bundle(), 3);
        // Each element spans 6 IDs.
        assert_eq!(ty.field_id(0), 1);
        assert_eq!(ty.field_id(1), 7);
        assert_eq!(ty.field_id(2), 13);
        assert_eq!(ty.max_field_id(), 18);
        assert_eq!(ty.index_for_field_id(6), 0);
        assert_eq!(ty.index_for_field_id(7), 1);
    }

    #[test]
    fn rewrite_nested_leaf() {
        let ty = sample_bundle();
        // Replace b.x (ID 2 + 1) with asyncreset.
        let id = ty.field_id(1) + ty.fields()[1].ty.field_id(0);
        let updated = ty.with_field_type(id, Type::AsyncReset);
        assert_eq!(updated.fields()[1].ty.fields()[0].ty, Type::AsyncReset);
        // Everything else is untouched.
        assert_eq!(updated.fields()[0].ty, Type::Uint(1));
        assert_eq!(updated.fields()[1].ty.fields()[1].ty, Type::Uint(8));
        assert_eq!(updated.fields()[2].ty, Type::Clock);
    }

    #[test]
    fn rewrite_vector_element() {
        let ty = Type::vector(Type::Reset, 4);
        let updated = ty.with_field_type(1, Type::Uint(1));
        assert_eq!(*updated.element(), Type::Uint(1));
    }
}
