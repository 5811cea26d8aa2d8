use tracing::trace;

use crate::task::{
  Category,
  Task
};

/// Tab used for tasks that arrive without a category.
pub const DEFAULT_CATEGORY: Category =
  Category::Lead;

/// Confidence strictly below this asks for a human review.
pub const LOW_CONFIDENCE_THRESHOLD: f64 =
  0.75;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPolicy {
  pub default_category:         Category,
  pub low_confidence_threshold: f64
}

impl Default for ViewPolicy {
  fn default() -> Self {
    Self {
      default_category:
        DEFAULT_CATEGORY,
      low_confidence_threshold:
        LOW_CONFIDENCE_THRESHOLD
    }
  }
}

/// Per-tab pending counts.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct TabCounts {
  pub urgent:   usize,
  pub lead:     usize,
  pub invoice:  usize,
  pub personal: usize
}

impl TabCounts {
  pub fn get(
    &self,
    tab: Category
  ) -> usize {
    match tab {
      | Category::Urgent => self.urgent,
      | Category::Lead => self.lead,
      | Category::Invoice => self.invoice,
      | Category::Personal => {
        self.personal
      }
    }
  }

  fn bump(&mut self, tab: Category) {
    let slot = match tab {
      | Category::Urgent => {
        &mut self.urgent
      }
      | Category::Lead => &mut self.lead,
      | Category::Invoice => {
        &mut self.invoice
      }
      | Category::Personal => {
        &mut self.personal
      }
    };
    *slot += 1;
  }

  /// Counts in tab display order.
  pub fn iter(
    &self
  ) -> impl Iterator<Item = (Category, usize)>
  + '_ {
    Category::ALL
      .into_iter()
      .map(move |tab| (tab, self.get(tab)))
  }

  pub fn total(&self) -> usize {
    self.urgent
      + self.lead
      + self.invoice
      + self.personal
  }
}

/// Derivations over a loaded task snapshot. Never touches storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct View {
  policy: ViewPolicy
}

impl View {
  pub fn new(
    policy: ViewPolicy
  ) -> Self {
    Self {
      policy
    }
  }

  pub fn normalize_category(
    &self,
    task: &Task
  ) -> Category {
    task
      .category
      .unwrap_or(
        self.policy.default_category
      )
  }

  pub fn is_low_confidence(
    &self,
    task: &Task
  ) -> bool {
    if task.category.is_none() {
      return true;
    }

    task
      .category_confidence
      .is_some_and(|confidence| {
        confidence
          < self
            .policy
            .low_confidence_threshold
      })
  }

  /// Pending tasks in `tab`, in input order.
  pub fn filter_by_tab<'a>(
    &self,
    tasks: &'a [Task],
    tab: Category
  ) -> Vec<&'a Task> {
    let rows: Vec<&Task> = tasks
      .iter()
      .filter(|task| {
        task.is_pending()
          && self
            .normalize_category(task)
            == tab
      })
      .collect();
    trace!(tab = %tab, count = rows.len(), "filtered tab");
    rows
  }

  pub fn counts_by_tab(
    &self,
    tasks: &[Task]
  ) -> TabCounts {
    let mut counts =
      TabCounts::default();
    for task in tasks
      .iter()
      .filter(|task| task.is_pending())
    {
      counts.bump(
        self.normalize_category(task)
      );
    }
    counts
  }

  pub fn total_pending(
    &self,
    tasks: &[Task]
  ) -> usize {
    tasks
      .iter()
      .filter(|task| task.is_pending())
      .count()
  }

  /// Pending tasks carrying the review prompt, in input order.
  pub fn needs_review<'a>(
    &self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    tasks
      .iter()
      .filter(|task| {
        task.is_pending()
          && self.is_low_confidence(task)
      })
      .collect()
  }
}
