//! Steps that fill year and period.

use dossiermig_core::{FileDescriptor, MigrationItem};

use super::{Mutator, Step};
use crate::error::PipelineResult;
use crate::tokens::{find_year, period_from_segment};

/// Year from the first relative directory segment holding a `20dd` token.
#[derive(Debug, Default, Clone, Copy)]
pub struct YearFromSourcePath;

impl Mutator for YearFromSourcePath {
    fn name(&self) -> &'static str {
        "year_from_source_path"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        if item.year.is_none() {
            item.year = file.relative_path.split('/').find_map(find_year);
        }
        Ok(Step::Continue(item))
    }
}

/// Year from a `20dd` token in the filename.
#[derive(Debug, Default, Clone, Copy)]
pub struct YearFromFilename;

impl Mutator for YearFromFilename {
    fn name(&self) -> &'static str {
        "year_from_filename"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        if item.year.is_none() {
            item.year = find_year(&file.filename);
        }
        Ok(Step::Continue(item))
    }
}

/// Period from the first relative directory segment that is a quarter or month token.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeriodFromSourcePath;

impl Mutator for PeriodFromSourcePath {
    fn name(&self) -> &'static str {
        "period_from_source_path"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        if item.period.is_none() {
            item.period = file.relative_path.split('/').find_map(period_from_segment);
        }
        Ok(Step::Continue(item))
    }
}

/// Copies the year tracked by the source, overwriting any earlier value.
#[derive(Debug, Default, Clone, Copy)]
pub struct YearFromDescriptor;

impl Mutator for YearFromDescriptor {
    fn name(&self) -> &'static str {
        "year_from_descriptor"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        item.year = file.year;
        Ok(Step::Continue(item))
    }
}

/// Copies the period tracked by the source, overwriting any earlier value.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeriodFromDescriptor;

impl Mutator for PeriodFromDescriptor {
    fn name(&self) -> &'static str {
        "period_from_descriptor"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        item.period.clone_from(&file.period);
        Ok(Step::Continue(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continued(step: &dyn Mutator, file: &FileDescriptor, item: MigrationItem) -> MigrationItem {
        match step.apply(file, item) {
            Ok(Step::Continue(item)) => item,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn year_comes_from_first_matching_segment() {
        let file = FileDescriptor::new("a.pdf", "/s", "10 - Acme/Boekjaar 2021/2022");
        let item = continued(&YearFromSourcePath, &file, MigrationItem::from_descriptor(&file));
        assert_eq!(item.year, Some(2021));
    }

    #[test]
    fn year_steps_keep_existing_values() {
        let file = FileDescriptor::new("rapport 2019.pdf", "/s", "2021");
        let mut seeded = MigrationItem::from_descriptor(&file);
        seeded.year = Some(2018);
        let item = continued(&YearFromSourcePath, &file, seeded.clone());
        assert_eq!(item.year, Some(2018));
        let item = continued(&YearFromFilename, &file, seeded);
        assert_eq!(item.year, Some(2018));
    }

    #[test]
    fn year_from_filename_fills_gaps() {
        let file = FileDescriptor::new("jaarrekening_2019.pdf", "/s", "Overig");
        let item = continued(&YearFromSourcePath, &file, MigrationItem::from_descriptor(&file));
        assert_eq!(item.year, None);
        let item = continued(&YearFromFilename, &file, item);
        assert_eq!(item.year, Some(2019));
    }

    #[test]
    fn period_prefers_first_token_segment() {
        let file = FileDescriptor::new("a.pdf", "/s", "10 - Acme/2023/Q2/05");
        let item = continued(&PeriodFromSourcePath, &file, MigrationItem::from_descriptor(&file));
        assert_eq!(item.period.as_deref(), Some("q2"));

        let file = FileDescriptor::new("a.pdf", "/s", "Salaris/2023/07");
        let item = continued(&PeriodFromSourcePath, &file, MigrationItem::from_descriptor(&file));
        assert_eq!(item.period.as_deref(), Some("m7"));
    }

    #[test]
    fn descriptor_values_are_copied_unconditionally() {
        let file = FileDescriptor::new("a.pdf", "/s", "").with_year(2020).with_period("q4");
        let mut seeded = MigrationItem::from_descriptor(&file);
        seeded.year = Some(2001);
        seeded.period = Some("m1".into());
        let item = continued(&YearFromDescriptor, &file, seeded);
        let item = continued(&PeriodFromDescriptor, &file, item);
        assert_eq!(item.year, Some(2020));
        assert_eq!(item.period.as_deref(), Some("q4"));

        let bare = FileDescriptor::new("b.pdf", "/s", "");
        let item = continued(&YearFromDescriptor, &bare, item);
        assert_eq!(item.year, None);
    }
}
