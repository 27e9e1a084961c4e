use std::collections::HashMap;
use std::hash::Hash;

/// Bidirectional mapping between feature descriptors and dense integer codes.
pub trait FeatureEncoding<T> {
    /// Get or allocate the code of `value`.
    ///
    /// Returns `None` when the value is unseen and the encoding is read-only.
    fn put(&mut self, value: T) -> Option<u32>;

    /// Code of `value`, if it has one.
    fn code(&self, value: &T) -> Option<u32>;

    /// Descriptor behind `code`.
    fn value(&self, code: u32) -> Option<&T>;

    /// Number of allocated codes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop (or resume) allocating codes for unseen values.
    fn set_read_only(&mut self, read_only: bool);

    fn is_read_only(&self) -> bool;
}

/// Hash map backed [`FeatureEncoding`]. Codes are allocated in insertion
/// order starting at 0.
#[derive(Debug, Clone)]
pub struct MapEncoding<T> {
    /// Map from descriptor to code
    value_to_code: HashMap<T, u32>,
    /// Map from code to descriptor
    code_to_value: Vec<T>,
    read_only: bool,
}

impl<T: Hash + Eq + Clone> MapEncoding<T> {
    /// Create a new empty encoding
    pub fn new() -> Self {
        Self {
            value_to_code: HashMap::new(),
            code_to_value: Vec::new(),
            read_only: false,
        }
    }

    /// Remove every code
    pub fn clear(&mut self) {
        self.value_to_code.clear();
        self.code_to_value.clear();
    }

    /// Iterate over all (descriptor, code) pairs in code order
    pub fn iter(&self) -> impl Iterator<Item = (&T, u32)> + '_ {
        self.code_to_value
            .iter()
            .enumerate()
            .map(|(code, value)| (value, code as u32))
    }
}

impl<T: Hash + Eq + Clone> FeatureEncoding<T> for MapEncoding<T> {
    fn put(&mut self, value: T) -> Option<u32> {
        if let Some(&code) = self.value_to_code.get(&value) {
            return Some(code);
        }
        if self.read_only {
            return None;
        }
        let code = self.code_to_value.len() as u32;
        self.value_to_code.insert(value.clone(), code);
        self.code_to_value.push(value);
        Some(code)
    }

    fn code(&self, value: &T) -> Option<u32> {
        self.value_to_code.get(value).copied()
    }

    fn value(&self, code: u32) -> Option<&T> {
        self.code_to_value.get(code as usize)
    }

    fn len(&self) -> usize {
        self.code_to_value.len()
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl<T: Hash + Eq + Clone> Default for MapEncoding<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_basic() {
        let mut enc = MapEncoding::new();
        assert_eq!(enc.len(), 0);
        assert!(enc.is_empty());

        assert_eq!(enc.put("w=the".to_string()), Some(0));
        assert_eq!(enc.put("w=dog".to_string()), Some(1));
        // Same descriptor, same code
        assert_eq!(enc.put("w=the".to_string()), Some(0));
        assert_eq!(enc.len(), 2);

        assert_eq!(enc.code(&"w=dog".to_string()), Some(1));
        assert_eq!(enc.value(1).map(String::as_str), Some("w=dog"));
        assert_eq!(enc.value(2), None);
    }

    #[test]
    fn test_encoding_read_only() {
        let mut enc = MapEncoding::new();
        enc.put("a");
        enc.set_read_only(true);
        assert!(enc.is_read_only());

        assert_eq!(enc.put("a"), Some(0));
        assert_eq!(enc.put("b"), None);
        assert_eq!(enc.len(), 1);

        enc.set_read_only(false);
        assert_eq!(enc.put("b"), Some(1));
    }

    #[test]
    fn test_encoding_iter_and_clear() {
        let mut enc = MapEncoding::new();
        enc.put((0u32, vec![3u32, 4]));
        enc.put((1u32, vec![5u32]));

        let items: Vec<_> = enc.iter().collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], (&(1u32, vec![5u32]), 1));

        enc.clear();
        assert!(enc.is_empty());
    }
}
