#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    StatusUpdate { text: String },
    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::TaskIncrement);
    }

    #[test]
    fn callback_receives_events_in_order() {
        let seen = Mutex::new(Vec::new());
        {
            let reporter = ProgressReporter::with_callback(Box::new(|event| {
                let label = match event {
                    Progress::PhaseStart { name } => name.to_string(),
                    Progress::StatusUpdate { text } => text,
                    _ => "other".to_string(),
                };
                seen.lock().unwrap().push(label);
            }));
            reporter.report(Progress::PhaseStart { name: "Search" });
            reporter.report(Progress::StatusUpdate {
                text: "best -1.0".to_string(),
            });
            reporter.report(Progress::PhaseFinish);
        }
        assert_eq!(
            seen.into_inner().unwrap(),
            vec!["Search", "best -1.0", "other"]
        );
    }
}
