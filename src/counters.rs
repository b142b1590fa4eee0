use std::fmt;

use crate::error::{GridError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub count: u64,
    pub percentage: f64,
}

impl Counter {
    fn finish(&mut self, total: u64) {
        self.percentage = if total == 0 {
            0.0
        } else {
            self.count as f64 / total as f64 * 100.0
        };
    }
}

/// Named counters sharing one total, kept in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSet {
    counters: Vec<(String, Counter)>,
    total: u64,
}

impl CounterSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            counters: names
                .into_iter()
                .map(|name| (name.into(), Counter::default()))
                .collect(),
            total: 0,
        }
    }

    pub fn increment(&mut self, name: &str) -> Result<()> {
        let (_, counter) = self
            .counters
            .iter_mut()
            .find(|(registered, _)| registered == name)
            .ok_or_else(|| GridError::UnknownCategory(name.to_string()))?;
        counter.count += 1;
        self.total += 1;
        Ok(())
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        self.counter(name).map(|c| c.count)
    }

    /// Percentage as of the last [`CounterSet::finish_all`].
    pub fn percentage(&self, name: &str) -> Option<f64> {
        self.counter(name).map(|c| c.percentage)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.counters.iter().map(|(name, _)| name.as_str())
    }

    /// Recomputes every percentage from the current counts. Safe to repeat.
    pub fn finish_all(&mut self) {
        let total = self.total;
        for (_, counter) in &mut self.counters {
            counter.finish(total);
        }
    }

    /// Finalizes percentages and renders the aligned table.
    pub fn render(&mut self) -> String {
        self.finish_all();
        self.to_string()
    }

    fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters
            .iter()
            .find(|(registered, _)| registered == name)
            .map(|(_, counter)| counter)
    }
}

impl fmt::Display for CounterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let longest = self.names().map(str::len).max().unwrap_or(0);
        let pad = (longest + 3).max(8);
        let total_percentage = if self.total == 0 { 0.0 } else { 100.0 };

        for (name, counter) in &self.counters {
            let mut current = counter.clone();
            current.finish(self.total);
            writeln!(
                f,
                "{:<pad$}{:>6}    {:4.2} %",
                name, current.count, current.percentage
            )?;
        }
        write!(
            f,
            "{:<pad$}{:>6}    {:4.2} %",
            "Total", self.total, total_percentage
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANIMALS: [&str; 4] = ["armadillo", "duck", "parrots-living", "parrots-deceased"];

    #[test]
    fn test_counts_sum_to_total() {
        let mut counters = CounterSet::new(ANIMALS);
        for i in 0..1000 {
            counters.increment(ANIMALS[(i * 7) % 4]).unwrap();
        }
        let sum: u64 = ANIMALS.iter().filter_map(|name| counters.count(name)).sum();
        assert_eq!(sum, counters.total());
        assert_eq!(counters.total(), 1000);
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let mut counters = CounterSet::new(["a"]);
        let result = counters.increment("b");
        assert!(matches!(result, Err(GridError::UnknownCategory(name)) if name == "b"));
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let mut counters = CounterSet::new(["a", "b", "c"]);
        for name in ["a", "a", "b", "c", "c", "c"] {
            counters.increment(name).unwrap();
        }
        counters.finish_all();
        counters.finish_all();
        let sum: f64 = ["a", "b", "c"]
            .iter()
            .filter_map(|name| counters.percentage(name))
            .sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!((counters.percentage("c").unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_total_renders_zero() {
        let mut counters = CounterSet::new(["OK BOTH"]);
        let text = counters.render();
        assert_eq!(counters.percentage("OK BOTH"), Some(0.0));
        assert!(text.lines().all(|line| line.ends_with("0.00 %")));
    }

    #[test]
    fn test_render_alignment() {
        let mut counters = CounterSet::new(["OK BOTH", "LOW BOTH"]);
        counters.increment("OK BOTH").unwrap();
        counters.increment("OK BOTH").unwrap();
        counters.increment("LOW BOTH").unwrap();

        let text = counters.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "OK BOTH         2    66.67 %",
                "LOW BOTH        1    33.33 %",
                "Total           3    100.00 %",
            ]
        );
    }

    #[test]
    fn test_short_names_pad_to_eight() {
        let mut counters = CounterSet::new(["a"]);
        counters.increment("a").unwrap();
        assert!(counters.render().starts_with("a            1    100.00 %"));
    }
}
