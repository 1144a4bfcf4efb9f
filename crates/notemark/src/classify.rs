use crate::config::MarkerConfig;
use crate::model::{Category, ScopeKind};
use crate::recognize::{
    Checkbox, FenceState, MarkerScan, fence_update, has_content, is_list_item, parse_checkbox,
    parse_heading, scan_markers,
};

/// Text rewrite queued by a scan to bring checkbox and markers back in agreement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RepairKind {
    /// Both active and completed markers present: drop the active one.
    DropActiveMarker,
    /// Checked checkbox without a completed marker: stamp completion.
    AppendCompletion,
    /// Completed marker on an unchecked checkbox: tick the box.
    CheckBox,
}

/// Header item whose scope collects the list items that follow it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenScope {
    pub kind: ScopeKind,
    pub line: usize,
    pub level: u8,
    pub children: Vec<usize>,
}

/// A line the classifier decided to materialize as an item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub category: Category,
    pub has_checkbox: bool,
    pub markers: MarkerScan,
    pub section_level: Option<u8>,
    pub parent_line: Option<usize>,
}

/// Result of classifying one line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineStep {
    pub item: Option<ClassifiedLine>,
    /// Scopes closed by this line, with their accumulated children.
    pub closed: Vec<OpenScope>,
    pub repairs: Vec<RepairKind>,
}

/// Line-by-line classifier carrying fence and header-scope state for one scan pass.
pub struct LineClassifier<'a> {
    markers: &'a MarkerConfig,
    fence: Option<FenceState>,
    scopes: [Option<OpenScope>; 3],
}

impl<'a> LineClassifier<'a> {
    pub fn new(markers: &'a MarkerConfig) -> Self {
        Self {
            markers,
            fence: None,
            scopes: [None, None, None],
        }
    }

    pub fn inside_fence(&self) -> bool {
        self.fence.is_some()
    }

    pub fn classify(&mut self, line_no: usize, line: &str) -> LineStep {
        if let Some(next) = fence_update(self.fence.as_ref(), line) {
            self.fence = next;
            return LineStep::default();
        }
        if self.fence.is_some() {
            return LineStep::default();
        }

        let scan = scan_markers(line);

        if let Some((level, _)) = parse_heading(line) {
            return self.classify_heading(line_no, line, level, scan);
        }

        if scan.only_shielded() {
            return LineStep::default();
        }

        let checkbox = parse_checkbox(line);

        if is_list_item(line) {
            if let Some(step) = self.classify_child(line_no, line, &scan, checkbox) {
                return step;
            }
        }

        let Some(kind) = self.explicit_kind(&scan) else {
            return LineStep::default();
        };
        if !has_content(line) {
            return LineStep::default();
        }
        let (category, repairs) = self.resolve(kind, &scan, checkbox);
        LineStep {
            item: Some(ClassifiedLine {
                category,
                has_checkbox: checkbox.is_some(),
                markers: scan,
                section_level: None,
                parent_line: None,
            }),
            closed: Vec::new(),
            repairs,
        }
    }

    /// Closes whatever scopes are still open at end of document.
    pub fn finish(mut self) -> Vec<OpenScope> {
        self.close_all()
    }

    fn classify_heading(
        &mut self,
        line_no: usize,
        line: &str,
        level: u8,
        scan: MarkerScan,
    ) -> LineStep {
        // A header ends every scope, whatever it carries itself.
        let closed = self.close_all();

        let Some(kind) = self.explicit_kind(&scan) else {
            return LineStep {
                closed,
                ..Default::default()
            };
        };
        if !has_content(line) {
            return LineStep {
                closed,
                ..Default::default()
            };
        }

        let (category, repairs) = self.resolve(kind, &scan, None);
        self.scopes[kind.index()] = Some(OpenScope {
            kind,
            line: line_no,
            level,
            children: Vec::new(),
        });

        LineStep {
            item: Some(ClassifiedLine {
                category,
                has_checkbox: false,
                markers: scan,
                section_level: Some(level),
                parent_line: None,
            }),
            closed,
            repairs,
        }
    }

    fn classify_child(
        &mut self,
        line_no: usize,
        line: &str,
        scan: &MarkerScan,
        checkbox: Option<Checkbox>,
    ) -> Option<LineStep> {
        let scope_kind = self.scopes.iter().flatten().map(|s| s.kind).next()?;

        if let Some(explicit) = self.explicit_kind(scan) {
            if explicit != scope_kind {
                return None;
            }
        }
        if !has_content(line) {
            return Some(LineStep::default());
        }

        let (category, repairs) = self.resolve(scope_kind, scan, checkbox);
        let scope = self.scopes[scope_kind.index()].as_mut()?;
        scope.children.push(line_no);

        Some(LineStep {
            item: Some(ClassifiedLine {
                category,
                has_checkbox: checkbox.is_some(),
                markers: scan.clone(),
                section_level: None,
                parent_line: Some(scope.line),
            }),
            closed: Vec::new(),
            repairs,
        })
    }

    /// Category family named by the line's markers; idea beats principle beats task.
    fn explicit_kind(&self, scan: &MarkerScan) -> Option<ScopeKind> {
        if scan.contains(&self.markers.idea) {
            Some(ScopeKind::Idea)
        } else if scan.contains(&self.markers.principle) {
            Some(ScopeKind::Principle)
        } else if scan.contains(&self.markers.task) || scan.contains(&self.markers.completed) {
            Some(ScopeKind::Task)
        } else {
            None
        }
    }

    fn resolve(
        &self,
        kind: ScopeKind,
        scan: &MarkerScan,
        checkbox: Option<Checkbox>,
    ) -> (Category, Vec<RepairKind>) {
        match kind {
            ScopeKind::Idea => (Category::Idea, Vec::new()),
            ScopeKind::Principle => (Category::Principle, Vec::new()),
            ScopeKind::Task => resolve_task_state(self.markers, scan, checkbox),
        }
    }

    fn close_all(&mut self) -> Vec<OpenScope> {
        self.scopes.iter_mut().filter_map(Option::take).collect()
    }
}

/// Decides open vs. completed for a task-family line and which repairs it needs.
pub fn resolve_task_state(
    markers: &MarkerConfig,
    scan: &MarkerScan,
    checkbox: Option<Checkbox>,
) -> (Category, Vec<RepairKind>) {
    let active = scan.contains(&markers.task);
    let done = scan.contains(&markers.completed);
    let checked = checkbox.map(|c| c.checked);

    let mut repairs = Vec::new();
    if done {
        if active {
            repairs.push(RepairKind::DropActiveMarker);
        }
        if checked == Some(false) {
            repairs.push(RepairKind::CheckBox);
        }
        return (Category::CompletedTask, repairs);
    }
    if checked == Some(true) {
        repairs.push(RepairKind::AppendCompletion);
        return (Category::CompletedTask, repairs);
    }
    (Category::Task, repairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> Vec<(usize, LineStep)> {
        let markers = MarkerConfig::default();
        let mut classifier = LineClassifier::new(&markers);
        let mut out: Vec<(usize, LineStep)> = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx, classifier.classify(idx, line)))
            .collect();
        let tail = classifier.finish();
        if !tail.is_empty() {
            out.push((
                usize::MAX,
                LineStep {
                    closed: tail,
                    ..Default::default()
                },
            ));
        }
        out
    }

    fn categories(steps: &[(usize, LineStep)]) -> Vec<(usize, Category)> {
        steps
            .iter()
            .filter_map(|(idx, step)| step.item.as_ref().map(|item| (*idx, item.category)))
            .collect()
    }

    #[test]
    fn checkbox_task_line() {
        let steps = run("- [ ] #task write report");
        let item = steps[0].1.item.as_ref().expect("item");
        assert_eq!(item.category, Category::Task);
        assert!(item.has_checkbox);
        assert!(steps[0].1.repairs.is_empty());
    }

    #[test]
    fn fenced_lines_are_ignored() {
        let steps = run("```\n- [ ] #task hidden\n```\n- [ ] #task visible");
        assert_eq!(categories(&steps), vec![(3, Category::Task)]);
    }

    #[test]
    fn inline_code_marker_is_not_an_item() {
        let steps = run("`#task` example");
        assert!(categories(&steps).is_empty());
    }

    #[test]
    fn header_scope_collects_list_children() {
        let steps = run("## Sprint #task\n- one\n- [ ] two\n## Notes\n- three");
        assert_eq!(
            categories(&steps),
            vec![(0, Category::Task), (1, Category::Task), (2, Category::Task)]
        );
        let closed = &steps[3].1.closed;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].line, 0);
        assert_eq!(closed[0].children, vec![1, 2]);
        assert_eq!(
            steps[1].1.item.as_ref().and_then(|i| i.parent_line),
            Some(0)
        );
    }

    #[test]
    fn unmarked_header_closes_scope() {
        let steps = run("## Ideas #idea\n- first\n### Aside\n- second");
        assert_eq!(categories(&steps), vec![(0, Category::Idea), (1, Category::Idea)]);
        assert_eq!(steps[2].1.closed[0].children, vec![1]);
    }

    #[test]
    fn conflicting_child_marker_is_standalone() {
        let steps = run("## Ideas #idea\n- do it #task\n- musing");
        let child = steps[1].1.item.as_ref().expect("item");
        assert_eq!(child.category, Category::Task);
        assert_eq!(child.parent_line, None);
        let closed = &steps.last().expect("tail").1.closed;
        assert_eq!(closed[0].children, vec![2]);
    }

    #[test]
    fn idea_beats_principle_beats_task() {
        let steps = run("#task #principle #idea all three\n#task #principle two");
        assert_eq!(
            categories(&steps),
            vec![(0, Category::Idea), (1, Category::Principle)]
        );
    }

    #[test]
    fn double_tagged_line_is_completed_with_repair() {
        let steps = run("#task #task-done finish report");
        let step = &steps[0].1;
        assert_eq!(step.item.as_ref().map(|i| i.category), Some(Category::CompletedTask));
        assert_eq!(step.repairs, vec![RepairKind::DropActiveMarker]);
    }

    #[test]
    fn checked_box_without_marker_is_completed_with_repair() {
        let steps = run("- [x] #task ship it");
        let step = &steps[0].1;
        assert_eq!(step.item.as_ref().map(|i| i.category), Some(Category::CompletedTask));
        assert_eq!(step.repairs, vec![RepairKind::AppendCompletion]);
    }

    #[test]
    fn completed_marker_ticks_open_box() {
        let steps = run("- [ ] #task-done @2024-01-02 ship it");
        assert_eq!(steps[0].1.repairs, vec![RepairKind::CheckBox]);
    }

    #[test]
    fn checkbox_inherits_task_scope() {
        let steps = run("# Today #task\n- [x] laundry\n- [ ] dishes");
        assert_eq!(
            categories(&steps),
            vec![
                (0, Category::Task),
                (1, Category::CompletedTask),
                (2, Category::Task)
            ]
        );
        assert_eq!(steps[1].1.repairs, vec![RepairKind::AppendCompletion]);
    }

    #[test]
    fn bare_marker_is_not_materialized() {
        let steps = run("## #task\n- child");
        assert!(categories(&steps).is_empty());
    }

    #[test]
    fn plain_checkbox_outside_scope_is_ignored() {
        let steps = run("- [ ] groceries");
        assert!(categories(&steps).is_empty());
    }
}
