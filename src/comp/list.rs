use super::Component;

/// Receives each component type of a [`ComponentList`].
pub trait TypeVisitor {
    /// Called once per component type, in tuple order.
    fn visit<T: Component>(&mut self);
}

/// A statically known list of component types.
///
/// Implemented for tuples of up to 8 components, including `()`.
pub trait ComponentList: 'static {
    /// Number of types in the list.
    const LEN: usize;

    /// Calls `visitor` with every type in the list.
    fn visit<V: TypeVisitor>(visitor: &mut V);
}

macro_rules! impl_component_list {
    () => {
        impl ComponentList for () {
            const LEN: usize = 0;

            fn visit<V: TypeVisitor>(_: &mut V) {}
        }
    };
    ($first:ident $(, $rest:ident)*) => {
        impl<$first: Component, $($rest: Component),*> ComponentList for ($first, $($rest,)*) {
            const LEN: usize = 1 $(+ impl_component_list!(@one $rest))*;

            fn visit<V: TypeVisitor>(visitor: &mut V) {
                visitor.visit::<$first>();
                $(visitor.visit::<$rest>();)*
            }
        }

        impl_component_list!($($rest),*);
    };
    (@one $ident:ident) => { 1 };
}

impl_component_list!(T1, T2, T3, T4, T5, T6, T7, T8);
