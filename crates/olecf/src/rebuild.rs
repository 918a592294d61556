//! Directory normalization after mutations: drop dead slots, inject missing
//! parent storages, re-sort, and regenerate tree links.

use crate::consts::NOSTREAM;
use crate::entry::{Entry, EntryType};
use crate::path::{dirname, filename, namecmp};

fn link_in_range(link: i32, len: usize) -> bool {
    link >= -1 && (link as i64) < len as i64
}

/// Normalize the model. A full pass runs when `force` is set or when the
/// tail-to-head scan finds anything suspicious; otherwise entries and paths
/// are preserved as-is (trailing free slots are always trimmed).
pub(crate) fn rebuild(full_paths: &mut Vec<String>, file_index: &mut Vec<Entry>, force: bool) {
    let mut gc = force;
    let mut seen_typed = false;
    let mut i = file_index.len();
    while i > 0 {
        i -= 1;
        let entry_type = file_index[i].entry_type;
        match entry_type {
            EntryType::Unknown => {
                if seen_typed {
                    gc = true;
                } else {
                    file_index.pop();
                    full_paths.pop();
                }
            }
            EntryType::Storage | EntryType::Stream | EntryType::Root => {
                seen_typed = true;
                let len = file_index.len();
                let e = &file_index[i];
                if !link_in_range(e.left, len)
                    || !link_in_range(e.right, len)
                    || !link_in_range(e.child, len)
                {
                    gc = true;
                }
                if e.left > -1 && e.right > -1 && e.left == e.right {
                    gc = true;
                }
            }
        }
    }
    if !gc {
        return;
    }

    // Collect typed entries, keeping the first occurrence of any duplicated
    // path.
    let mut data: Vec<(String, Entry)> = Vec::with_capacity(file_index.len());
    for (path, entry) in full_paths.drain(..).zip(file_index.drain(..)) {
        if entry.entry_type == EntryType::Unknown {
            continue;
        }
        if data.iter().any(|(p, _)| *p == path) {
            continue;
        }
        data.push((path, entry));
    }

    // Inject a synthetic storage for every missing ancestor. Injected
    // storages are themselves visited, so deep paths materialize their whole
    // parent chain.
    let mut k = 0;
    while k < data.len() {
        let dad = dirname(&data[k].0);
        if dad != data[k].0 && !data.iter().any(|(p, _)| *p == dad) {
            let name = filename(&dad).replace('/', "");
            data.push((dad, Entry::new_storage(name)));
        }
        k += 1;
    }

    data.sort_by(|x, y| namecmp(&x.0, &y.0));

    for (path, entry) in data {
        full_paths.push(path);
        file_index.push(entry);
    }

    let n = file_index.len();
    for i in 0..n {
        let path = full_paths[i].clone();
        let e = &mut file_index[i];
        e.name = filename(&path).replace('/', "");
        e.color = 1;
        e.left = NOSTREAM;
        e.right = NOSTREAM;
        e.child = NOSTREAM;
        e.size = e.content.as_ref().map_or(0, |c| c.len() as u64);
        e.start = 0;

        if i == 0 {
            e.child = if n > 1 { 1 } else { NOSTREAM };
            e.size = 0;
            e.entry_type = EntryType::Root;
        } else if path.ends_with('/') {
            e.entry_type = EntryType::Storage;
        } else {
            e.entry_type = EntryType::Stream;
        }
    }

    // Link assignment: storages point C at their first member and R at the
    // next entry in the same parent; streams point R at an immediately
    // following sibling. The result is a right-linked spine rather than a
    // balanced red-black tree, which readers accept.
    for i in 1..n {
        let path = full_paths[i].clone();
        if path.ends_with('/') {
            let mut child = NOSTREAM;
            for j in i + 1..n {
                if dirname(&full_paths[j]) == path {
                    child = j as i32;
                    break;
                }
            }
            let mut right = NOSTREAM;
            let parent = dirname(&path);
            for j in i + 1..n {
                if dirname(&full_paths[j]) == parent {
                    right = j as i32;
                    break;
                }
            }
            let e = &mut file_index[i];
            e.child = child;
            e.right = right;
        } else if i + 1 < n && dirname(&full_paths[i + 1]) == dirname(&path) {
            file_index[i].right = (i + 1) as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model(paths: &[(&str, EntryType)]) -> (Vec<String>, Vec<Entry>) {
        let mut full_paths = Vec::new();
        let mut file_index = Vec::new();
        for (p, t) in paths {
            full_paths.push(p.to_string());
            let mut e = match t {
                EntryType::Root => Entry::new_root(),
                EntryType::Storage => Entry::new_storage(filename(p).to_string()),
                _ => Entry::new_stream(filename(p).to_string(), Some(b"x".to_vec())),
            };
            e.entry_type = *t;
            file_index.push(e);
        }
        (full_paths, file_index)
    }

    #[test]
    fn rebuild_is_idempotent() {
        let (mut paths, mut entries) = model(&[
            ("Root Entry/", EntryType::Root),
            ("Root Entry/b.txt", EntryType::Stream),
            ("Root Entry/a.txt", EntryType::Stream),
        ]);
        rebuild(&mut paths, &mut entries, true);
        let (paths1, entries1) = (paths.clone(), entries.clone());
        rebuild(&mut paths, &mut entries, false);
        assert_eq!(paths, paths1);
        assert_eq!(entries, entries1);
        // A second forced pass converges too.
        rebuild(&mut paths, &mut entries, true);
        assert_eq!(paths, paths1);
        assert_eq!(entries, entries1);
    }

    #[test]
    fn missing_ancestors_are_injected() {
        let (mut paths, mut entries) = model(&[
            ("Root Entry/", EntryType::Root),
            ("Root Entry/a/b/c.txt", EntryType::Stream),
        ]);
        rebuild(&mut paths, &mut entries, true);
        assert_eq!(
            paths,
            vec![
                "Root Entry/".to_string(),
                "Root Entry/a/".to_string(),
                "Root Entry/a/b/".to_string(),
                "Root Entry/a/b/c.txt".to_string(),
            ]
        );
        assert_eq!(entries[1].entry_type, EntryType::Storage);
        assert_eq!(entries[1].child, 2);
        assert_eq!(entries[2].entry_type, EntryType::Storage);
        assert_eq!(entries[2].child, 3);
        assert_eq!(entries[3].entry_type, EntryType::Stream);
        assert_eq!(entries[3].right, NOSTREAM);
        assert_eq!(entries[0].child, 1);
    }

    #[test]
    fn sibling_streams_get_right_links() {
        let (mut paths, mut entries) = model(&[
            ("Root Entry/", EntryType::Root),
            ("Root Entry/bb.txt", EntryType::Stream),
            ("Root Entry/aa.txt", EntryType::Stream),
        ]);
        rebuild(&mut paths, &mut entries, true);
        assert_eq!(paths[1], "Root Entry/aa.txt");
        assert_eq!(paths[2], "Root Entry/bb.txt");
        assert_eq!(entries[1].right, 2);
        assert_eq!(entries[2].right, NOSTREAM);
        assert_eq!(entries[1].color, 1);
    }

    #[test]
    fn out_of_range_links_trigger_a_pass() {
        let (mut paths, mut entries) = model(&[
            ("Root Entry/", EntryType::Root),
            ("Root Entry/zz.txt", EntryType::Stream),
            ("Root Entry/a.txt", EntryType::Stream),
        ]);
        entries[1].left = 69;
        entries[1].right = 69;
        entries[1].child = 69;
        rebuild(&mut paths, &mut entries, false);
        // The pass re-sorted (shorter name first) and normalized the links.
        assert_eq!(paths[1], "Root Entry/a.txt");
        assert_eq!(entries[2].left, NOSTREAM);
    }

    #[test]
    fn trailing_free_slots_are_trimmed_without_a_pass() {
        let (mut paths, mut entries) = model(&[
            ("Root Entry/", EntryType::Root),
            ("Root Entry/a.txt", EntryType::Stream),
        ]);
        rebuild(&mut paths, &mut entries, true);
        let snapshot = (paths.clone(), entries.clone());
        paths.push("/".to_string());
        entries.push(Entry::blank());
        rebuild(&mut paths, &mut entries, false);
        assert_eq!((paths, entries), snapshot);
    }
}
