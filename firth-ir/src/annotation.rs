//! Annotations attached to modules, ports, and operations.

use firth_utils::{GPosIdx, Id, WithPos};

/// Marks a port or wire/node as the full async reset of its reset domain.
pub const FULL_ASYNC_RESET_ANNO: &str =
    "sifive.enterprise.firrtl.FullAsyncResetAnnotation";

/// Marks a module as explicitly not belonging to any reset domain.
pub const IGNORE_FULL_ASYNC_RESET_ANNO: &str =
    "sifive.enterprise.firrtl.IgnoreFullAsyncResetAnnotation";

/// A single annotation, identified by its class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub class: Id,
    pub pos: GPosIdx,
}

impl Annotation {
    pub fn new<S: Into<Id>>(class: S) -> Self {
        Annotation {
            class: class.into(),
            pos: GPosIdx::UNKNOWN,
        }
    }

    pub fn with_pos(mut self, pos: GPosIdx) -> Self {
        self.pos = pos;
        self
    }

    /// Whether this annotation has the given class name. Class names match
    /// exactly and case-sensitively.
    pub fn is_class(&self, class: &str) -> bool {
        self.class == class
    }
}

impl WithPos for Annotation {
    fn copy_span(&self) -> GPosIdx {
        self.pos
    }
}

/// An ordered set of annotations.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    annos: Vec<Annotation>,
}

impl AnnotationSet {
    pub fn add(&mut self, anno: Annotation) {
        self.annos.push(anno);
    }

    pub fn is_empty(&self) -> bool {
        self.annos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annos.iter()
    }

    /// Whether any annotation with the given class is present.
    pub fn has_class(&self, class: &str) -> bool {
        self.annos.iter().any(|a| a.is_class(class))
    }

    /// Consume every annotation for which `pred` returns `true`, keeping
    /// the rest. The retained set is rebuilt rather than edited in place,
    /// so `pred` may inspect the annotations freely.
    pub fn remove_matching<F>(&mut self, mut pred: F)
    where
        F: FnMut(&Annotation) -> bool,
    {
        let (_removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.annos)
                .into_iter()
                .partition(|anno| pred(anno));
        self.annos = kept;
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        AnnotationSet {
            annos: iter.into_iter().collect(),
        }
    }
}
