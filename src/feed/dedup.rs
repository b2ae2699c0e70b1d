use std::collections::HashSet;

use super::parser::ParsedPost;

/// Returns the posts of `fresh` whose title is not among `known_titles`,
/// in their original order.
///
/// A title repeated inside `fresh` is kept only at its first occurrence, so
/// the result never contains two posts with the same title.
pub fn diff<'k, I>(fresh: Vec<ParsedPost>, known_titles: I) -> Vec<ParsedPost>
where
    I: IntoIterator<Item = &'k str>,
{
    let mut seen: HashSet<String> = known_titles.into_iter().map(str::to_owned).collect();
    fresh
        .into_iter()
        .filter(|post| seen.insert(post.title.clone()))
        .collect()
}
