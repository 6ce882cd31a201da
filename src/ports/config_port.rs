//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Parsed float, `None` when the key is absent or not a number.
    fn get_double_opt(&self, section: &str, key: &str) -> Option<f64> {
        self.get_string(section, key)
            .and_then(|v| v.trim().parse::<f64>().ok())
    }

    fn has_section(&self, section: &str) -> bool;

    /// Keys present in a section, sorted.
    fn keys(&self, section: &str) -> Vec<String>;
}
