//! Weight progress chart: a pure derivation from the entry list.

use serde::Serialize;

use crate::models::WeightEntry;

pub const EMPTY_CHART: &str = "Add more weight entries to see your progress chart";
const DEFAULT_DESCRIPTION: &str = "Track your progress over time";
const DOMAIN_PADDING_KG: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Short date label, e.g. "Jan 1".
    pub label: String,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Lost,
    Gained,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lost => "lost",
            Self::Gained => "gained",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub amount: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeightStats {
    pub highest: String,
    pub lowest: String,
    pub average: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightChart {
    pub series: Vec<ChartPoint>,
    pub progress: Option<Progress>,
    pub stats: Option<WeightStats>,
    /// Y axis bounds: [min - 2, max + 2].
    pub domain: Option<(f64, f64)>,
}

impl WeightChart {
    pub fn from_entries(entries: &[WeightEntry]) -> Self {
        let mut sorted: Vec<&WeightEntry> = entries.iter().collect();
        sorted.sort_by_key(|e| e.date);

        let series = sorted
            .iter()
            .map(|e| ChartPoint {
                label: e.date.format("%b %-d").to_string(),
                weight_kg: e.weight_kg,
            })
            .collect();

        let progress = match (sorted.first(), sorted.last()) {
            (Some(first), Some(last)) if sorted.len() >= 2 => {
                let diff = first.weight_kg - last.weight_kg;
                Some(Progress {
                    amount: format!("{:.1}", diff.abs()),
                    direction: if diff > 0.0 {
                        Direction::Lost
                    } else {
                        Direction::Gained
                    },
                })
            }
            _ => None,
        };

        let bounds = entries.iter().map(|e| e.weight_kg).fold(None, |acc, w| {
            Some(match acc {
                None => (w, w),
                Some((lo, hi)) => (f64::min(lo, w), f64::max(hi, w)),
            })
        });

        #[allow(clippy::cast_precision_loss)]
        let stats = bounds.map(|(lowest, highest)| {
            let average =
                entries.iter().map(|e| e.weight_kg).sum::<f64>() / entries.len() as f64;
            WeightStats {
                highest: format!("{highest:.1}"),
                lowest: format!("{lowest:.1}"),
                average: format!("{average:.1}"),
            }
        });

        Self {
            series,
            progress,
            stats,
            domain: bounds.map(|(lo, hi)| (lo - DOMAIN_PADDING_KG, hi + DOMAIN_PADDING_KG)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn description(&self) -> String {
        match &self.progress {
            Some(p) => format!(
                "You've {} {} kg since you started!",
                p.direction.as_str(),
                p.amount
            ),
            None => DEFAULT_DESCRIPTION.to_string(),
        }
    }
}
