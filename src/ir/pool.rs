use std::{collections::HashMap, fmt, num::NonZeroU32, rc::Rc};

/// A handle to a literal stored in a [`ConstantPool`]. To retrieve the text,
/// use [`ConstantPool::get`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Constant {
    // A NonZeroU32 leverages niche layout optimization.
    handle: NonZeroU32,
}

impl Constant {
    fn index(self) -> usize {
        self.handle.get() as usize - 1
    }
}

impl fmt::Debug for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constant({})", self.handle)
    }
}

/// The deduplicated set of numeric literals referenced by a program.
///
/// Keys are the literal text, so `3` and `3.0` are distinct entries.
/// Iteration follows first-insertion order, which keeps generated output
/// reproducible.
#[derive(Default)]
pub struct ConstantPool {
    map: HashMap<Rc<str>, Constant>,
    vec: Vec<Rc<str>>,
}

impl fmt::Debug for ConstantPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.vec).finish()
    }
}

impl ConstantPool {
    pub fn with_capacity(capacity: usize) -> Self {
        ConstantPool {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Records the literal, returning the handle of its (single) pool entry.
    ///
    /// Panics if more than `u32::MAX - 1` distinct literals are interned.
    pub fn intern(&mut self, literal: &str) -> Constant {
        if let Some(constant) = self.map.get(literal) {
            return *constant;
        }
        let len = u32::try_from(self.vec.len()).expect("constant pool out of capacity");
        let handle = NonZeroU32::MIN
            .checked_add(len)
            .expect("constant pool out of capacity");
        let constant = Constant { handle };
        let key: Rc<str> = literal.into();
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, constant);
        constant
    }

    /// Returns the literal for the provided handle. Panics if the handle comes
    /// from another pool.
    pub fn get(&self, constant: Constant) -> &str {
        &self.vec[constant.index()]
    }

    /// Walks the pool in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.vec.iter().map(|literal| &**literal)
    }
}
