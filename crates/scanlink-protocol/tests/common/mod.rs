//! Common test utilities for integration tests.
//!
//! [`Randomizer`] fills a settings tree with in-range values drawn from a
//! seed vector, so property tests can explore whole trees without spelling
//! out a strategy per leaf.

#![allow(dead_code)]

use std::fmt;

use scanlink_protocol::settings::{
    Bounds, Choice, ConfigScope, ConfigurationTree, MultiLineSymbology, Numeric, SettingsNode,
    TextRule, Walker,
};

/// Walker that overwrites every leaf with a valid value picked from `seeds`.
pub struct Randomizer {
    seeds: Vec<u64>,
    next: usize,
    last_number: u64,
}

impl Randomizer {
    pub fn new(seeds: Vec<u64>) -> Self {
        Self {
            seeds,
            next: 0,
            last_number: 0,
        }
    }

    fn seed(&mut self) -> u64 {
        if self.seeds.is_empty() {
            return 0;
        }
        let seed = self.seeds[self.next % self.seeds.len()];
        self.next += 1;
        seed.rotate_left(self.next as u32 % 64)
    }
}

fn pick_in(seed: u64, lo: u64, hi: u64) -> u64 {
    lo + seed % (hi - lo + 1)
}

fn is_upper_bound(key: &str) -> bool {
    key.ends_with("_max") || key.starts_with("max_")
}

impl Walker for Randomizer {
    fn flag(&mut self, _key: &str, value: &mut bool) {
        *value = self.seed() % 2 == 1;
    }

    fn number<T: Numeric>(&mut self, key: &str, value: &mut T, bounds: Bounds) {
        let lo = if is_upper_bound(key) {
            self.last_number.clamp(bounds.min, bounds.max)
        } else {
            bounds.min
        };
        let picked = pick_in(self.seed(), lo, bounds.max);
        if let Ok(v) = T::try_from(picked) {
            *value = v;
        }
        self.last_number = picked;
    }

    fn choice<C: Choice>(&mut self, _key: &str, value: &mut C) {
        let index = (self.seed() % C::ALL.len() as u64) as usize;
        *value = C::ALL[index];
    }

    fn text(&mut self, _key: &str, value: &mut String, rule: TextRule) {
        let candidates: &[&str] = match rule {
            TextRule::LeadingCharacter => &["", "?", "0", "7"],
            TextRule::CodabarStartStop => &["", "AB", "?D", "??", "C?"],
            TextRule::StfStartStop => &["", "S", "N"],
            TextRule::Free => &["", "UTF-8", "Shift_JIS", "x y"],
        };
        let index = (self.seed() % candidates.len() as u64) as usize;
        *value = candidates[index].to_string();
    }

    fn node<N: SettingsNode>(&mut self, _key: &str, node: &mut N) {
        node.walk(self);
    }

    fn check(&mut self, _key: &str, _ok: bool, _value: &dyn fmt::Display, _allowed: &str) {}
}

/// A valid random tree for `scope`.
pub fn random_tree(scope: ConfigScope, seeds: Vec<u64>) -> ConfigurationTree {
    let mut randomizer = Randomizer::new(seeds);
    let mut tree = ConfigurationTree::default_for(scope);
    match &mut tree {
        ConfigurationTree::Barcode(s) => {
            s.walk(&mut randomizer);
            let multi = &mut s.decode.multi_line;
            if multi.second.symbology == MultiLineSymbology::None {
                multi.third.symbology = MultiLineSymbology::None;
                multi.third.start_stop_character.clear();
            }
        }
        ConfigurationTree::Rfid(s) => s.walk(&mut randomizer),
        ConfigurationTree::Common(s) => s.walk(&mut randomizer),
        ConfigurationTree::AutoLinkProfile(s) => s.walk(&mut randomizer),
    }
    tree
}

/// Walk the settings node inside `tree`.
pub fn walk_tree<W: Walker>(tree: &mut ConfigurationTree, w: &mut W) {
    match tree {
        ConfigurationTree::Barcode(s) => s.walk(w),
        ConfigurationTree::Rfid(s) => s.walk(w),
        ConfigurationTree::Common(s) => s.walk(w),
        ConfigurationTree::AutoLinkProfile(s) => s.walk(w),
    }
}

fn dotted(nodes: &[String], key: &str) -> String {
    nodes
        .iter()
        .map(String::as_str)
        .chain([key])
        .collect::<Vec<_>>()
        .join(".")
}

/// Records the dotted path of every numeric leaf, in walk order.
#[derive(Default)]
struct NumericLeaves {
    nodes: Vec<String>,
    paths: Vec<String>,
}

impl Walker for NumericLeaves {
    fn flag(&mut self, _key: &str, _value: &mut bool) {}

    fn number<T: Numeric>(&mut self, key: &str, _value: &mut T, _bounds: Bounds) {
        self.paths.push(dotted(&self.nodes, key));
    }

    fn choice<C: Choice>(&mut self, _key: &str, _value: &mut C) {}

    fn text(&mut self, _key: &str, _value: &mut String, _rule: TextRule) {}

    fn node<N: SettingsNode>(&mut self, key: &str, node: &mut N) {
        self.nodes.push(key.to_string());
        node.walk(self);
        self.nodes.pop();
    }

    fn check(&mut self, _key: &str, _ok: bool, _value: &dyn fmt::Display, _allowed: &str) {}
}

/// Dotted paths of every numeric leaf of `tree`.
pub fn numeric_leaves(tree: &ConfigurationTree) -> Vec<String> {
    let mut walker = NumericLeaves::default();
    walk_tree(&mut tree.clone(), &mut walker);
    walker.paths
}

/// Moves one numeric leaf just past its bounds.
struct PushOutOfRange<'a> {
    nodes: Vec<String>,
    target: &'a str,
    pushed: Option<u64>,
}

impl Walker for PushOutOfRange<'_> {
    fn flag(&mut self, _key: &str, _value: &mut bool) {}

    fn number<T: Numeric>(&mut self, key: &str, value: &mut T, bounds: Bounds) {
        if dotted(&self.nodes, key) != self.target {
            return;
        }
        let above = bounds
            .max
            .checked_add(1)
            .filter(|v| T::try_from(*v).is_ok());
        let below = bounds.min.checked_sub(1).filter(|v| !bounds.contains(*v));
        let Some(v) = above.or(below) else {
            return;
        };
        if let Ok(out) = T::try_from(v) {
            *value = out;
            self.pushed = Some(v);
        }
    }

    fn choice<C: Choice>(&mut self, _key: &str, _value: &mut C) {}

    fn text(&mut self, _key: &str, _value: &mut String, _rule: TextRule) {}

    fn node<N: SettingsNode>(&mut self, key: &str, node: &mut N) {
        self.nodes.push(key.to_string());
        node.walk(self);
        self.nodes.pop();
    }

    fn check(&mut self, _key: &str, _ok: bool, _value: &dyn fmt::Display, _allowed: &str) {}
}

/// `tree` with the leaf at `path` moved outside its bounds, and the value it
/// now holds. `None` when the leaf's type spans its whole range.
pub fn push_out_of_range(tree: &ConfigurationTree, path: &str) -> Option<(ConfigurationTree, u64)> {
    let mut broken = tree.clone();
    let mut walker = PushOutOfRange {
        nodes: Vec::new(),
        target: path,
        pushed: None,
    };
    walk_tree(&mut broken, &mut walker);
    walker.pushed.map(|value| (broken, value))
}
