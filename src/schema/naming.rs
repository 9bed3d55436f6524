/// Turns a dotted member path into a physical column name that fits the
/// target engine's identifier limit.
pub trait MemberNameTranslator: Send + Sync {
    fn translate(&self, path: &str) -> String;
}

/// Replaces dots with underscores; over-length names keep a prefix and get
/// a crc32 suffix so distinct paths stay distinct.
#[derive(Debug, Clone)]
pub struct DefaultNameTranslator {
    pub max_length: usize,
}

impl DefaultNameTranslator {
    pub fn new(max_length: usize) -> Self {
        // Room for at least one character plus the hash suffix
        DefaultNameTranslator { max_length: max_length.max(10) }
    }
}

impl MemberNameTranslator for DefaultNameTranslator {
    fn translate(&self, path: &str) -> String {
        let name = path.replace('.', "_");
        if name.chars().count() <= self.max_length {
            return name;
        }

        let hash = crc32fast::hash(path.as_bytes());
        let prefix: String = name.chars().take(self.max_length - 9).collect();
        format!("{}_{:08x}", prefix, hash)
    }
}
