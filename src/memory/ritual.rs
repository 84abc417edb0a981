//! Ritual sequences: a short structured practice built from a user's memory.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::phase::Element;

/// Symbols carried into the symbol-work step.
pub const MAX_RITUAL_SYMBOLS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RitualStepKind {
    Opening,
    Balancing,
    SymbolWork,
    Grounding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RitualStep {
    pub kind: RitualStepKind,
    pub element: Element,
    pub minutes: u32,
    pub symbols: Vec<String>,
}

impl RitualStep {
    fn new(kind: RitualStepKind, element: Element, minutes: u32) -> Self {
        Self {
            kind,
            element,
            minutes,
            symbols: Vec::new(),
        }
    }
}

/// Element with the lowest share; ties go to the earlier element.
pub fn weakest_element(balance: &BTreeMap<Element, f64>) -> Element {
    Element::ALL
        .into_iter()
        .fold((Element::Fire, f64::INFINITY), |(best, low), e| {
            let share = balance.get(&e).copied().unwrap_or(0.0);
            if share < low { (e, share) } else { (best, low) }
        })
        .0
}

/// Opening, balancing the weakest element, symbol work when any symbols
/// resonate, then grounding.
pub fn plan(balance: &BTreeMap<Element, f64>, resonant: &[String]) -> Vec<RitualStep> {
    let mut steps = vec![
        RitualStep::new(RitualStepKind::Opening, Element::Aether, 5),
        RitualStep::new(RitualStepKind::Balancing, weakest_element(balance), 10),
    ];
    if !resonant.is_empty() {
        let mut work = RitualStep::new(RitualStepKind::SymbolWork, Element::Water, 10);
        work.symbols = resonant.iter().take(MAX_RITUAL_SYMBOLS).cloned().collect();
        steps.push(work);
    }
    steps.push(RitualStep::new(RitualStepKind::Grounding, Element::Earth, 5));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_memory_balances_fire() {
        let steps = plan(&BTreeMap::new(), &[]);
        let kinds: Vec<_> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![RitualStepKind::Opening, RitualStepKind::Balancing, RitualStepKind::Grounding]
        );
        assert_eq!(steps[1].element, Element::Fire);
        assert_eq!(steps.iter().map(|s| s.minutes).sum::<u32>(), 20);
    }

    #[test]
    fn balances_the_weakest_element() {
        let balance: BTreeMap<_, _> = [
            (Element::Fire, 0.5),
            (Element::Water, 0.2),
            (Element::Earth, 0.2),
            (Element::Air, 0.1),
            (Element::Aether, 0.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(weakest_element(&balance), Element::Aether);
    }

    #[test]
    fn symbol_work_keeps_top_three() {
        let symbols: Vec<String> = ["fire", "tree", "sky", "seed"].map(String::from).to_vec();
        let steps = plan(&BTreeMap::new(), &symbols);
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[2].kind, RitualStepKind::SymbolWork);
        assert_eq!(steps[2].symbols, vec!["fire", "tree", "sky"]);
        assert_eq!(steps[3].element, Element::Earth);
    }
}
