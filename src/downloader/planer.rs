use std::future::Future;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::Context;
use crate::error::{Error, Result};
use crate::scraper::ModuleDescriptor;
use crate::utils::limited_spawner::LimitedSpawner;
use crate::utils::multierr::MultiError;

/// What to do with the remaining modules once one of them fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Let every module finish and report all failures at the end.
    #[default]
    Continue,
    /// Cancel everything still running and return the first failure.
    FailFast,
}

#[derive(Debug)]
pub struct ModuleOutcome<T> {
    /// Position of the module link on the course page.
    pub index: usize,
    pub link: String,
    pub result: Result<T>,
}

/// Per-module outcomes of one course run, in course page order.
#[derive(Debug)]
pub struct CourseReport<T> {
    pub course_id: String,
    pub outcomes: Vec<ModuleOutcome<T>>,
}

impl<T> CourseReport<T> {
    pub fn successes(&self) -> impl Iterator<Item = &T> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.link.as_str(), e)))
    }

    pub fn into_result(self) -> std::result::Result<Vec<T>, MultiError<Error>> {
        let mut values = Vec::with_capacity(self.outcomes.len());
        let mut errors = MultiError::new();
        for outcome in self.outcomes {
            match outcome.result {
                Ok(value) => values.push(value),
                Err(err) => errors.push(outcome.link, err),
            }
        }
        errors.into_result().map(|_| values)
    }
}

/// Walks a course: finds its modules and runs a callback for each one,
/// all modules in parallel.
pub struct CourseProcessor {
    ctx: Context,
    concurrency: Option<usize>,
    policy: FailurePolicy,
}

impl CourseProcessor {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            concurrency: None,
            policy: FailurePolicy::default(),
        }
    }

    /// Caps the number of modules in flight. `None` runs all of them at once.
    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Fetches the course page, then for every module link fetches the
    /// module page, extracts its descriptor and awaits `callback` with it.
    ///
    /// Returns once every module has finished. Under
    /// [`FailurePolicy::FailFast`] the first failing module cancels the rest
    /// and its error is returned instead of a report.
    pub async fn process_course<T, F, Fut>(
        &self,
        course_id: &str,
        callback: F,
    ) -> Result<CourseReport<T>>
    where
        T: Send + 'static,
        F: Fn(ModuleDescriptor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let course_page = self
            .ctx
            .fetcher
            .fetch_text(&self.ctx.config.course_url(course_id))
            .await?;
        let links = self.ctx.extractor.extract_links(&course_page);
        info!("Found {} audios in the course", links.len());
        if links.is_empty() {
            warn!(course_id, "no modules found on course page");
        }

        let spawner = LimitedSpawner::with_limit(self.concurrency);
        let callback = Arc::new(callback);
        let mut aborts = Vec::with_capacity(links.len());
        let mut pending = FuturesUnordered::new();

        for (index, link) in links.into_iter().enumerate() {
            let fetcher = self.ctx.fetcher.clone();
            let extractor = Arc::clone(&self.ctx.extractor);
            let callback = Arc::clone(&callback);
            let module_link = link.clone();

            let handle = spawner.spawn(async move {
                let module_page = fetcher.fetch_text(&module_link).await?;
                let descriptor = extractor.extract_descriptor(&module_page)?;
                debug!(link = %module_link, org = %descriptor.current_org, "module descriptor");
                (*callback)(descriptor).await
            });

            aborts.push(handle.abort_handle());
            pending.push(async move { (index, link, handle.await) });
        }

        let mut outcomes = Vec::with_capacity(aborts.len());
        while let Some((index, link, joined)) = pending.next().await {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(closed)) => Err(Error::from(closed)),
                Err(join) => Err(Error::from(join)),
            };

            if let (Err(_), FailurePolicy::FailFast) = (&result, self.policy) {
                spawner.close();
                for abort in &aborts {
                    abort.abort();
                }
                // Join barrier: wait for the cancelled units to wind down.
                while pending.next().await.is_some() {}

                let mut errors = MultiError::new();
                if let Err(err) = result {
                    errors.push(link, err);
                }
                return Err(Error::Modules(errors));
            }

            outcomes.push(ModuleOutcome {
                index,
                link,
                result,
            });
        }

        outcomes.sort_by_key(|o| o.index);
        Ok(CourseReport {
            course_id: course_id.to_string(),
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_support::{MockCourse, MockModule};
    use std::sync::Mutex;

    fn processor(course: &MockCourse) -> CourseProcessor {
        let ctx = Context::new(Config::new("tok").with_base_url(course.base())).unwrap();
        CourseProcessor::new(ctx)
    }

    #[tokio::test]
    async fn test_all_callbacks_run_before_return() {
        // Later modules answer first, so completion order is reversed.
        let modules = (0..6)
            .map(|i| MockModule::new(format!("ORG{}", i), vec![]).delay_ms(200 - 40 * i as u64))
            .collect();
        let course = MockCourse::start(modules).await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&seen);
        let report = processor(&course)
            .process_course("1", move |descriptor| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().unwrap().push(descriptor.current_org.clone());
                    Ok(descriptor)
                }
            })
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().len(), 6);
        assert_eq!(seen.lock().unwrap()[0], "ORG5");

        let orgs: Vec<_> = report.successes().map(|d| d.current_org.as_str()).collect();
        assert_eq!(orgs, vec!["ORG0", "ORG1", "ORG2", "ORG3", "ORG4", "ORG5"]);
        assert_eq!(report.course_id, "1");
    }

    #[tokio::test]
    async fn test_descriptor_values_reach_callback() {
        let course = MockCourse::start(vec![MockModule::new("Lesson-A", vec![])]).await;

        let report = processor(&course)
            .process_course("1", |descriptor| async move { Ok(descriptor) })
            .await
            .unwrap();

        let descriptor = report.into_result().unwrap().remove(0);
        assert_eq!(descriptor.current_org, "Lesson-A");
        assert_eq!(descriptor.sco, "0");
        assert_eq!(descriptor.scorm, "100");
    }

    #[tokio::test]
    async fn test_continue_collects_failures() {
        let modules = vec![
            MockModule::new("ok", vec![]),
            MockModule::new("bad", vec![]).broken(),
            MockModule::new("ok2", vec![]),
        ];
        let course = MockCourse::start(modules).await;

        let report = processor(&course)
            .process_course("1", |descriptor| async move { Ok(descriptor) })
            .await
            .unwrap();

        assert_eq!(report.successes().count(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0].1, Error::Extract(_)));
    }

    #[tokio::test]
    async fn test_callback_error_is_per_module() {
        let modules = vec![MockModule::new("a", vec![]), MockModule::new("b", vec![])];
        let course = MockCourse::start(modules).await;

        let report = processor(&course)
            .process_course("1", |descriptor| async move {
                if descriptor.current_org == "b" {
                    Err(Error::invalid_config("callback refused"))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].result.is_ok());
        assert!(report.outcomes[1].result.is_err());
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_remaining() {
        let modules = vec![
            MockModule::new("bad", vec![]).broken(),
            MockModule::new("slow", vec![]).delay_ms(2_000),
        ];
        let course = MockCourse::start(modules).await;
        let finished = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&finished);
        let started = std::time::Instant::now();
        let err = processor(&course)
            .with_policy(FailurePolicy::FailFast)
            .process_course("1", move |descriptor| {
                let recorder = Arc::clone(&recorder);
                async move {
                    recorder.lock().unwrap().push(descriptor.current_org);
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Modules(ref errs) if errs.len() == 1));
        assert!(finished.lock().unwrap().is_empty());
        assert!(started.elapsed() < std::time::Duration::from_millis(1_500));
    }

    #[tokio::test]
    async fn test_bounded_concurrency_still_visits_all() {
        let modules = (0..5)
            .map(|i| MockModule::new(format!("m{}", i), vec![]))
            .collect();
        let course = MockCourse::start(modules).await;

        let report = processor(&course)
            .with_concurrency(Some(2))
            .process_course("1", |descriptor| async move { Ok(descriptor) })
            .await
            .unwrap();

        assert_eq!(report.successes().count(), 5);
    }

    #[tokio::test]
    async fn test_empty_course() {
        let course = MockCourse::start(vec![]).await;

        let report = processor(&course)
            .process_course("1", |descriptor| async move { Ok(descriptor) })
            .await
            .unwrap();

        assert!(report.outcomes.is_empty());
    }
}
