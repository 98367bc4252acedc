use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonically increasing counter for generating unique test resource names.
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generates a unique name prefix for namespaces and links.
///
/// Combines the prefix, process ID, and an atomic counter so tests can run
/// in parallel. Kept short because derived interface names must stay within
/// the 15 character Linux limit.
pub fn unique_prefix(prefix: &str) -> String {
    let seq = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    let name = format!("{}{:x}{}", prefix, pid % 0xFFF, seq);
    name.chars().take(9).collect()
}
