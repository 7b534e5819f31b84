/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

/// Find the candidate closest to `key` by Levenshtein distance. Ties go to
/// the earliest candidate. Returns `None` for an empty key or no candidates.
pub fn fuzzy_search(key: &str, candidates: &[impl AsRef<str>]) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    candidates
        .iter()
        .map(AsRef::as_ref)
        .enumerate()
        .min_by_key(|(idx, candidate)| (levenshtein_distance(key, candidate), *idx))
        .map(|(_, candidate)| candidate.to_owned())
}

/// Edit distance between two strings, counted in `char`s
pub fn levenshtein_distance(word1: &str, word2: &str) -> usize {
    let w2 = word2.chars().collect::<Vec<_>>();
    // `prev[j]` is the distance between the first `i` chars of `word1` and
    // the first `j` chars of `word2`
    let mut prev = (0..=w2.len()).collect::<Vec<_>>();
    let mut cur = vec![0; w2.len() + 1];
    for (i, c1) in word1.chars().enumerate() {
        // PANIC SAFETY: `cur` and `prev` both have length `w2.len() + 1`, and
        // `j` ranges over `0..w2.len()`, so `j` and `j + 1` are in bounds.
        #[allow(clippy::indexing_slicing)]
        {
            cur[0] = i + 1;
            for (j, c2) in w2.iter().enumerate() {
                cur[j + 1] = if c1 == *c2 {
                    prev[j]
                } else {
                    1 + prev[j].min(prev[j + 1]).min(cur[j])
                };
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev.last().copied().unwrap_or_default()
}

// PANIC SAFETY unit tests
#[allow(clippy::panic)]
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distances() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", ""), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("User", "user"), 1);
        assert_eq!(levenshtein_distance("Photo", "Photo"), 0);
    }

    #[test]
    fn suggests_closest_entity_type() {
        let types = ["PhotoApp::User", "PhotoApp::Photo", "PhotoApp::Album"];
        assert_eq!(
            fuzzy_search("PhotoApp::Usr", &types),
            Some("PhotoApp::User".to_owned())
        );
        assert_eq!(
            fuzzy_search("photoapp::photo", &types),
            Some("PhotoApp::Photo".to_owned())
        );
    }

    #[test]
    fn ties_go_to_first_candidate() {
        assert_eq!(
            fuzzy_search("viewx", &["view", "viex", "view"]),
            Some("view".to_owned())
        );
    }

    #[test]
    fn non_ascii() {
        assert_eq!(levenshtein_distance("café", "cafe"), 1);
        assert_eq!(
            fuzzy_search("naïve", &["naive", "native"]),
            Some("naive".to_owned())
        );
    }

    #[test]
    fn nothing_to_suggest() {
        assert_eq!(fuzzy_search("", &["User"]), None);
        assert_eq!(fuzzy_search("User", &[] as &[&str]), None);
    }
}
