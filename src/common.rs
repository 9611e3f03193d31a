use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

pub fn write_string_to_file(filename: &str, content: &str) -> std::io::Result<()> {
    let path = Path::new(filename);
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// True iff the indices are exactly `{1..n}` with no repeats
pub fn is_consecutive_from_one(indices: impl IntoIterator<Item = u32>) -> bool {
    let mut count = 0usize;
    let distinct: BTreeSet<u32> = indices
        .into_iter()
        .inspect(|_| count += 1)
        .collect();
    distinct.len() == count
        && distinct
            .iter()
            .enumerate()
            .all(|(position, idx)| *idx as usize == position + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_indices() {
        assert!(is_consecutive_from_one(Vec::<u32>::new()));
        assert!(is_consecutive_from_one([1]));
        assert!(is_consecutive_from_one([3, 1, 2]));
        assert!(!is_consecutive_from_one([1, 3]));
        assert!(!is_consecutive_from_one([0, 1]));
        assert!(!is_consecutive_from_one([1, 1, 2]));
    }

    #[test]
    fn writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_string_to_file(path.to_str().unwrap(), "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }
}
