/// Returns the canonical form of a URL path.
///
/// Repeated slashes are collapsed, `.` elements are dropped, and each `..`
/// removes the element before it. A `..` at the root is dropped. The result
/// always begins with `/`, and keeps a trailing slash if the input had one
/// or ended in a `.` element.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let trailing =
        (path.len() > 1 && path.ends_with('/')) || path == "." || path.ends_with("/.");

    let mut clean = String::with_capacity(path.len() + 1);
    for segment in &segments {
        clean.push('/');
        clean.push_str(segment);
    }

    if clean.is_empty() || trailing {
        clean.push('/');
    }

    clean
}
