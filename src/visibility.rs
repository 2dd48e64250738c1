use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    KpiCards,
    RevenueChart,
    CategoryPieChart,
    CategoryBarChart,
    ProductsTable,
    AnalyticsCharts,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::KpiCards,
        Section::RevenueChart,
        Section::CategoryPieChart,
        Section::CategoryBarChart,
        Section::ProductsTable,
        Section::AnalyticsCharts,
    ];
}

// pure UI state, lives outside the working/confirmed pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    sections: BTreeMap<Section, bool>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            sections: Section::ALL.iter().map(|s| (*s, true)).collect(),
        }
    }
}

impl Visibility {
    pub fn is_visible(&self, section: Section) -> bool {
        self.sections.get(&section).copied().unwrap_or(true)
    }
    /// Flips one section and returns its new visibility.
    pub fn toggle(&mut self, section: Section) -> bool {
        let flag = self.sections.entry(section).or_insert(true);
        *flag = !*flag;
        *flag
    }
    pub fn iter(&self) -> impl Iterator<Item = (Section, bool)> + '_ {
        self.sections.iter().map(|(s, v)| (*s, *v))
    }
}
