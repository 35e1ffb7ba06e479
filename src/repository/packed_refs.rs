//! `packed-refs` tidying
//!
//! Interrupted writes leave repeated names and stray peel lines in
//! `packed-refs`, which makes some tools refuse the whole file. Lines with
//! all-zero ids are references in their own right and stay; the scanner
//! reports them and reference repair decides their fate.

const ZERO_HEX: &str = "0000000000000000000000000000000000000000";

/// Drop duplicate names (first occurrence wins) and peel lines that no
/// longer follow a kept reference, or that peel to the zero id. Returns the
/// new text and the number of lines removed.
pub fn tidy_packed_refs(content: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut seen = std::collections::HashSet::new();
    let mut removed = 0;
    // Whether the line above is a reference that was kept
    let mut peelable = false;

    for line in content.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            out.push_str(line);
            out.push('\n');
            peelable = false;
            continue;
        }

        if let Some(peeled) = line.strip_prefix('^') {
            if peelable && peeled.trim() != ZERO_HEX {
                out.push_str(line);
                out.push('\n');
            } else {
                removed += 1;
            }
            peelable = false;
            continue;
        }

        let keep = match line.split_once(' ') {
            Some((_, name)) => seen.insert(name.trim().to_string()),
            // Unknown shape; leave it for git to judge
            None => true,
        };
        if keep {
            out.push_str(line);
            out.push('\n');
        } else {
            removed += 1;
        }
        peelable = keep;
    }

    if !content.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }
    (out, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn test_clean_file_untouched() {
        let content = format!("# pack-refs with: peeled fully-peeled sorted \n{A} refs/heads/main\n{B} refs/tags/v1\n^{A}\n");
        let (tidy, removed) = tidy_packed_refs(&content);
        assert_eq!(removed, 0);
        assert_eq!(tidy, content);
    }

    #[test]
    fn test_zero_reference_kept() {
        let content = format!("{ZERO_HEX} refs/heads/broken\n{A} refs/heads/main\n");
        let (tidy, removed) = tidy_packed_refs(&content);
        assert_eq!(removed, 0);
        assert_eq!(tidy, content);
    }

    #[test]
    fn test_duplicate_takes_its_peel_along() {
        let content = format!("{A} refs/tags/v1\n^{B}\n{B} refs/tags/v1\n^{A}\n{A} refs/heads/main\n");
        let (tidy, removed) = tidy_packed_refs(&content);
        assert_eq!(removed, 2);
        assert_eq!(tidy, format!("{A} refs/tags/v1\n^{B}\n{A} refs/heads/main\n"));
    }

    #[test]
    fn test_orphaned_peel_dropped() {
        let content = format!("# pack-refs with: peeled \n^{A}\n{A} refs/tags/v1\n^{B}\n^{A}\n");
        let (tidy, removed) = tidy_packed_refs(&content);
        assert_eq!(removed, 2);
        assert_eq!(tidy, format!("# pack-refs with: peeled \n{A} refs/tags/v1\n^{B}\n"));
    }

    #[test]
    fn test_first_duplicate_wins() {
        let content = format!("{A} refs/heads/main\n{B} refs/heads/main\n");
        let (tidy, removed) = tidy_packed_refs(&content);
        assert_eq!(removed, 1);
        assert_eq!(tidy, format!("{A} refs/heads/main\n"));
    }

    #[test]
    fn test_zero_peel_dropped_alone() {
        let content = format!("{A} refs/tags/v1\n^{ZERO_HEX}\n");
        let (tidy, removed) = tidy_packed_refs(&content);
        assert_eq!(removed, 1);
        assert_eq!(tidy, format!("{A} refs/tags/v1\n"));
    }
}
