use std::ops::Index;
use std::sync::Arc;

/// A single path parameter, consisting of a key and a value.
#[derive(Debug, Clone)]
struct Param {
    key: Arc<str>,
    value: String,
}

/// The parameters extracted from a matched path, in the order their segments
/// appear in the route pattern.
///
/// The container is meant to be reused: [`clear`](Params::clear) keeps both
/// the slot vector and each slot's value buffer, so steady-state matching
/// does not allocate.
///
/// ```
/// # use arbor::Params;
/// let mut params = Params::new();
/// params.push("id".into(), "42");
/// params.push("postId".into(), "7");
///
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(&params[1], "7");
/// assert_eq!(params.iter().collect::<Vec<_>>(), vec![("id", "42"), ("postId", "7")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Params {
    slots: Vec<Param>,
    len: usize,
}

impl Params {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of parameters.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the value of the first parameter registered under the given key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.active()
            .iter()
            .find(|param| &*param.key == key)
            .map(|param| param.value.as_str())
    }

    /// Returns an iterator over the parameters in the list.
    pub fn iter(&self) -> ParamsIter<'_> {
        ParamsIter {
            inner: self.active().iter(),
        }
    }

    /// Appends a parameter, reusing a previously allocated slot if one is
    /// available.
    pub fn push(&mut self, key: Arc<str>, value: &str) {
        match self.slots.get_mut(self.len) {
            Some(slot) => {
                slot.key = key;
                slot.value.clear();
                slot.value.push_str(value);
            }
            None => self.slots.push(Param {
                key,
                value: value.to_owned(),
            }),
        }
        self.len += 1;
    }

    /// Drops every parameter past `len`. Used when the matcher backtracks out
    /// of a subtree.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Removes all parameters while keeping their storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn active(&self) -> &[Param] {
        &self.slots[..self.len]
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Params {}

impl Index<usize> for Params {
    type Output = str;

    fn index(&self, i: usize) -> &Self::Output {
        &self.active()[i].value
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = ParamsIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the keys and values of a route's [`Params`].
pub struct ParamsIter<'a> {
    inner: std::slice::Iter<'a, Param>,
}

impl<'a> Iterator for ParamsIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|param| (&*param.key, param.value.as_str()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ParamsIter<'_> {}
