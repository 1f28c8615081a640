use tracing::{subscriber::Interest, Level, Metadata};
use tracing_subscriber::layer::{Context, Filter};

/// Drops chatty runtime internals and caps verbosity outside debug builds.
pub struct GeneralFilter {
    pub(crate) max_level: Level,
}

const EXCLUDE_PREFIX: [&str; 3] = ["tokio::", "runtime::", "mio::"];

impl GeneralFilter {
    fn is_enabled(&self, metadata: &Metadata<'_>) -> bool {
        let is_runtime = EXCLUDE_PREFIX
            .iter()
            .any(|prefix| metadata.target().starts_with(prefix))
            && *metadata.level() > Level::INFO;

        *metadata.level() <= self.max_level && !is_runtime
    }
}

impl<S> Filter<S> for GeneralFilter {
    fn enabled(&self, metadata: &Metadata<'_>, _: &Context<'_, S>) -> bool {
        self.is_enabled(metadata)
    }

    fn callsite_enabled(&self, metadata: &'static Metadata<'static>) -> Interest {
        if self.is_enabled(metadata) {
            Interest::always()
        } else {
            Interest::never()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{callsite::Identifier, field::FieldSet, metadata::Kind};

    struct Callsite;

    impl tracing::callsite::Callsite for Callsite {
        fn set_interest(&self, _: Interest) {}

        fn metadata(&self) -> &Metadata<'_> {
            unimplemented!()
        }
    }

    static CALLSITE: Callsite = Callsite;

    fn meta(target: &'static str, level: Level) -> Metadata<'static> {
        Metadata::new(
            "event",
            target,
            level,
            None,
            None,
            None,
            FieldSet::new(&[], Identifier(&CALLSITE)),
            Kind::EVENT,
        )
    }

    #[test]
    fn test_runtime_debug_is_excluded() {
        let filter = GeneralFilter {
            max_level: Level::TRACE,
        };
        assert!(!filter.is_enabled(&meta("tokio::task", Level::DEBUG)));
        assert!(filter.is_enabled(&meta("tokio::task", Level::WARN)));
        assert!(filter.is_enabled(&meta("playsync_rpc::handler", Level::DEBUG)));
    }

    #[test]
    fn test_max_level() {
        let filter = GeneralFilter { max_level: Level::INFO };
        assert!(filter.is_enabled(&meta("playsync_core", Level::INFO)));
        assert!(!filter.is_enabled(&meta("playsync_core", Level::DEBUG)));
    }
}
