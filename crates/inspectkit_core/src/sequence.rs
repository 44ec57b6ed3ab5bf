//! Item numbering continued across batches.

/// Hands out contiguous item numbers starting at the caller's watermark.
///
/// The start is a `u32` and numbers are `u64`, so a run can never outgrow
/// the number type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSequencer {
    start_item_no: u64,
    cnt_issued: u64,
}

impl ItemSequencer {
    /// Start numbering at `start_item_no`.
    pub fn new(start_item_no: u32) -> Self {
        Self {
            start_item_no: u64::from(start_item_no),
            cnt_issued: 0,
        }
    }

    /// Take the current number and advance by one.
    pub fn advance(&mut self) -> u64 {
        let n_item_no = self.start_item_no + self.cnt_issued;
        self.cnt_issued += 1;
        n_item_no
    }

    /// First number of the run.
    pub fn start_item_no(&self) -> u64 {
        self.start_item_no
    }

    /// Numbers handed out so far.
    pub fn count(&self) -> u64 {
        self.cnt_issued
    }

    /// Last number handed out, `None` before the first `advance`.
    pub fn end_item_no(&self) -> Option<u64> {
        self.cnt_issued
            .checked_sub(1)
            .map(|n_last| self.start_item_no + n_last)
    }
}

#[cfg(test)]
mod tests {
    use super::ItemSequencer;

    #[test]
    fn numbers_are_contiguous_from_start() {
        let mut sequencer = ItemSequencer::new(41);
        assert_eq!(sequencer.end_item_no(), None);
        assert_eq!(
            (0..3).map(|_| sequencer.advance()).collect::<Vec<_>>(),
            vec![41, 42, 43]
        );
        assert_eq!(sequencer.count(), 3);
        assert_eq!(sequencer.start_item_no(), 41);
        assert_eq!(sequencer.end_item_no(), Some(43));
    }

    #[test]
    fn largest_start_keeps_counting_past_u32() {
        let mut sequencer = ItemSequencer::new(u32::MAX);
        assert_eq!(sequencer.advance(), u64::from(u32::MAX));
        assert_eq!(sequencer.advance(), u64::from(u32::MAX) + 1);
        assert_eq!(sequencer.end_item_no(), Some(u64::from(u32::MAX) + 1));
    }
}
