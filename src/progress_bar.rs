use aggregation_common::ProgressReporter;
use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({percent}%) [{eta}]";

/// A styled bar of `len` steps labelled with `message`.
pub fn styled_bar(len: u64, message: impl Into<String>) -> Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(ProgressStyle::default_bar().template(TEMPLATE)?.progress_chars("#>-"));
    bar.set_message(message.into());
    Ok(bar)
}

/// Console progress for one trajectory or one fit.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new(message: impl Into<String>) -> Result<Self> {
        Ok(BarReporter {
            bar: styled_bar(0, message)?,
        })
    }

    /// Bar drawn as one line of a group shared by parallel runs.
    pub fn in_group(group: &MultiProgress, message: impl Into<String>) -> Result<Self> {
        let bar = group.add(styled_bar(0, message)?);
        Ok(BarReporter { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
    }

    fn advance(&self, position: u64) {
        self.bar.set_position(position);
    }

    fn finish(&self) {
        self.bar.finish();
    }
}
