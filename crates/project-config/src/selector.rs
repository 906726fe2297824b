//! Selector language (C2): a small boolean algebra over names and tags.
//!
//! ```text
//! Selector  := Criterion ( WS+ Criterion )*
//! Criterion := '!'? '.'? Name
//! Name      := ( not WS, not '.', not '!' )+
//! '*'       := the all-selector; no modifiers allowed
//! ```

use std::collections::{HashMap, HashSet};

use crate::error::{CompileError, ErrorCategory};

/// Anything that can be the subject of a selector: tasks, variants, and
/// per-axis axis values all implement this.
pub trait Cohort {
    /// The item's unique name within its cohort.
    fn selector_name(&self) -> &str;
    /// The item's tags.
    fn selector_tags(&self) -> &[String];
}

/// One criterion of a selector expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Criterion {
    /// The bare name, or `*` for the all-selector.
    pub name: String,
    /// Whether this criterion matches by tag (`.` prefix) rather than name.
    pub tagged: bool,
    /// Whether this criterion is negated (`!` prefix).
    pub negated: bool,
}

impl Criterion {
    fn parse(token: &str, source: &str) -> Result<Self, CompileError> {
        let mut rest = token;
        let negated = if let Some(stripped) = rest.strip_prefix('!') {
            rest = stripped;
            true
        } else {
            false
        };
        let tagged = if let Some(stripped) = rest.strip_prefix('.') {
            rest = stripped;
            true
        } else {
            false
        };

        if rest.is_empty() {
            return Err(selector_error(
                format!("criterion '{token}' has an empty name"),
                source,
            ));
        }

        if rest == "*" {
            if negated || tagged {
                return Err(selector_error(
                    "'*' may not be combined with '.' or '!'",
                    source,
                ));
            }
        }

        Ok(Self {
            name: rest.to_string(),
            tagged,
            negated,
        })
    }
}

/// A parsed selector expression: an intersection of criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// The source text this selector was parsed from (kept for diagnostics).
    pub source: String,
    /// The parsed criteria, in source order.
    pub criteria: Vec<Criterion>,
}

impl Selector {
    /// Parse a selector expression. An empty selector is an error.
    pub fn parse(source: &str) -> Result<Self, CompileError> {
        let tokens: Vec<&str> = source.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(selector_error("selector has no criteria", source));
        }
        let criteria = tokens
            .into_iter()
            .map(|t| Criterion::parse(t, source))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            criteria,
        })
    }
}

fn selector_error(message: impl Into<String>, source: &str) -> CompileError {
    CompileError::new(ErrorCategory::SelectorError, message.into()).with_context(source)
}

/// An evaluator instantiated over a fixed cohort: precomputes a name-index
/// and a tag-index, then evaluates selectors read-only.
pub struct Evaluator<'a, T: Cohort> {
    items: &'a [T],
    name_index: HashMap<&'a str, usize>,
    tag_index: HashMap<&'a str, Vec<usize>>,
}

impl<'a, T: Cohort> Evaluator<'a, T> {
    /// Build an evaluator over `items`.
    #[must_use]
    pub fn new(items: &'a [T]) -> Self {
        let mut name_index = HashMap::with_capacity(items.len());
        let mut tag_index: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            name_index.insert(item.selector_name(), idx);
            for tag in item.selector_tags() {
                tag_index.entry(tag.as_str()).or_default().push(idx);
            }
        }
        Self {
            items,
            name_index,
            tag_index,
        }
    }

    /// Evaluate a single criterion against the cohort, returning the set of
    /// matching indices.
    fn eval_criterion(&self, criterion: &Criterion) -> Result<HashSet<usize>, CompileError> {
        if criterion.name == "*" {
            return Ok((0..self.items.len()).collect());
        }

        if criterion.tagged {
            let tagged: HashSet<usize> = self
                .tag_index
                .get(criterion.name.as_str())
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .collect();
            if tagged.is_empty() {
                return Err(CompileError::new(
                    ErrorCategory::SelectorError,
                    format!("nothing has the tag {}", criterion.name),
                ));
            }
            if criterion.negated {
                let all: HashSet<usize> = (0..self.items.len()).collect();
                return Ok(all.difference(&tagged).copied().collect());
            }
            return Ok(tagged);
        }

        let Some(&idx) = self.name_index.get(criterion.name.as_str()) else {
            return Err(CompileError::new(
                ErrorCategory::SelectorError,
                format!("nothing named {}", criterion.name),
            ));
        };

        if criterion.negated {
            let mut all: HashSet<usize> = (0..self.items.len()).collect();
            all.remove(&idx);
            return Ok(all);
        }

        Ok(HashSet::from([idx]))
    }

    /// Evaluate a parsed selector, returning the matching items in cohort
    /// order (so results are deterministic regardless of criteria order).
    pub fn eval(&self, selector: &Selector) -> Result<Vec<&'a T>, CompileError> {
        let indices = self.eval_indices(selector)?;
        Ok(self
            .items
            .iter()
            .enumerate()
            .filter(|(idx, _)| indices.contains(idx))
            .map(|(_, item)| item)
            .collect())
    }

    /// Same as [`Self::eval`] but parses `source` first.
    pub fn eval_str(&self, source: &str) -> Result<Vec<&'a T>, CompileError> {
        let selector = Selector::parse(source)?;
        self.eval(&selector)
    }

    /// The full cohort this evaluator was built over, in declaration order.
    #[must_use]
    pub fn items(&self) -> &'a [T] {
        self.items
    }

    fn eval_indices(&self, selector: &Selector) -> Result<HashSet<usize>, CompileError> {
        let mut result: Option<HashSet<usize>> = None;
        for criterion in &selector.criteria {
            let set = self
                .eval_criterion(criterion)
                .map_err(|e| e.with_context(selector.source.clone()))?;
            result = Some(match result {
                None => set,
                Some(acc) => acc.intersection(&set).copied().collect(),
            });
        }
        let result = result.unwrap_or_default();
        if result.is_empty() {
            return Err(selector_error(
                "selector matched nothing",
                &selector.source,
            ));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item {
        name: &'static str,
        tags: Vec<String>,
    }

    impl Cohort for Item {
        fn selector_name(&self) -> &str {
            self.name
        }
        fn selector_tags(&self) -> &[String] {
            &self.tags
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn cohort() -> Vec<Item> {
        vec![
            Item {
                name: "red",
                tags: tags(&["primary", "warm"]),
            },
            Item {
                name: "orange",
                tags: tags(&["secondary", "warm"]),
            },
            Item {
                name: "yellow",
                tags: tags(&["primary", "warm"]),
            },
            Item {
                name: "green",
                tags: tags(&["secondary", "cool"]),
            },
            Item {
                name: "blue",
                tags: tags(&["primary", "cool"]),
            },
        ]
    }

    #[test]
    fn tag_intersection_matches_scenario_1() {
        let items = cohort();
        let eval = Evaluator::new(&items);
        let result = eval.eval_str(".cool .primary").unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "blue");
    }

    #[test]
    fn disjoint_tags_yield_selector_error() {
        let items = cohort();
        let eval = Evaluator::new(&items);
        assert!(eval.eval_str(".warm .cool").is_err());
    }

    #[test]
    fn double_negation_yields_selector_error_not_empty_set() {
        let items = cohort();
        let eval = Evaluator::new(&items);
        let err = eval.eval_str("!.primary !.secondary").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::SelectorError);
    }

    #[test]
    fn empty_selector_is_an_error() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("   ").is_err());
    }

    #[test]
    fn star_with_modifiers_is_an_error() {
        assert!(Selector::parse("!*").is_err());
        assert!(Selector::parse(".*").is_err());
    }

    #[test]
    fn star_alone_means_all() {
        let items = cohort();
        let eval = Evaluator::new(&items);
        let result = eval.eval_str("*").unwrap();
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn evaluation_is_commutative_over_criteria_order() {
        let items = cohort();
        let eval = Evaluator::new(&items);
        let a = eval.eval_str(".cool .primary").unwrap();
        let b = eval.eval_str(".primary .cool").unwrap();
        let a_names: Vec<&str> = a.iter().map(|i| i.name).collect();
        let b_names: Vec<&str> = b.iter().map(|i| i.name).collect();
        assert_eq!(a_names, b_names);
    }

    proptest::proptest! {
        #[test]
        fn commutativity_holds_for_any_permutation_of_tag_criteria(
            seed in proptest::collection::vec(0usize..3, 1..4)
        ) {
            let items = cohort();
            let eval = Evaluator::new(&items);
            let tag_names = ["primary", "warm", "cool"];
            let criteria: Vec<String> = seed.iter().map(|i| format!(".{}", tag_names[*i])).collect();
            let forward = criteria.join(" ");
            let mut reversed = criteria.clone();
            reversed.reverse();
            let backward = reversed.join(" ");

            let forward_result = eval.eval_str(&forward);
            let backward_result = eval.eval_str(&backward);
            match (forward_result, backward_result) {
                (Ok(f), Ok(b)) => {
                    let f_names: Vec<&str> = f.iter().map(|i| i.name).collect();
                    let b_names: Vec<&str> = b.iter().map(|i| i.name).collect();
                    prop_assert_eq!(f_names, b_names);
                }
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "order changed success/failure outcome"),
            }
        }
    }
}
