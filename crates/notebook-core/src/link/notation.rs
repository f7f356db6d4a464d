use super::LinkReference;
use crate::model::PathName;

/// Shortest link text from `source` to `target`.
///
/// Inverse of [`LinkReference::resolve`]: resolving the result from
/// `source` yields `target` again, as long as the floating search does not
/// meet a same-named page on a deeper level first. The root has no name
/// of its own, a link to it is the bare `:`.
pub fn relative_notation(source: &PathName, target: &PathName) -> LinkReference {
    if target.is_root() {
        return LinkReference::absolute(target);
    }
    if target == source {
        return basename_link(target);
    }

    if let Ok(rel) = target.relative_to(source) {
        return LinkReference::relative(rel);
    }

    let parent = source.common_ancestor(target);
    if parent.is_root() {
        let anchor = target.parts()[0].to_lowercase();
        let collides = source.parts().iter().any(|part| part.to_lowercase() == anchor);
        if collides {
            // A floating link would get caught by the source's own namespace
            LinkReference::absolute(target)
        } else {
            LinkReference::floating(target.clone())
        }
    } else if &parent == target {
        basename_link(target)
    } else {
        let rel = target.relative_to(&parent).unwrap_or_else(|_| target.clone());
        if parent == source.parent() {
            LinkReference::floating(rel)
        } else {
            let anchored = PathName::from_parts(vec![parent.basename().to_string()]);
            LinkReference::floating(anchored.child(&rel))
        }
    }
}

fn basename_link(target: &PathName) -> LinkReference {
    LinkReference::floating(PathName::from_parts(vec![target.basename().to_string()]))
}
