use camino::Utf8Path;
use crossbeam::channel::{Receiver, Sender};

/// Creates a new context.
///
/// The [`Reporter`] can be freely cloned and handed to every generation pass.
///
/// The [`Report`] should not be sent to other threads.
pub fn init() -> (Report, Reporter) {
    let (errors_tx, errors_rx) = crossbeam::channel::unbounded();
    let (warnings_tx, warnings_rx) = crossbeam::channel::unbounded();
    (
        Report::new(errors_rx, warnings_rx),
        Reporter::new(errors_tx, warnings_tx),
    )
}

/// Used to accumulate errors and warnings.
#[derive(Clone)]
pub struct Reporter {
    errors: Sender<String>,
    warnings: Sender<String>,
}

impl Reporter {
    fn new(errors: Sender<String>, warnings: Sender<String>) -> Self {
        Self { errors, warnings }
    }

    /// Error about a generated file as a whole.
    #[expect(clippy::needless_pass_by_value)] // `&impl ToString` has worse usability
    pub fn error_file(&self, path: &Utf8Path, text: impl ToString) {
        self.errors
            .send(format!("{path}: {}", text.to_string()))
            .ok();
    }

    /// Warning about a type.
    #[expect(clippy::needless_pass_by_value)] // `&impl ToString` has worse usability
    pub fn warn(&self, fqname: &str, text: impl ToString) {
        self.warnings
            .send(format!("{fqname}: {}", text.to_string()))
            .ok();
    }
}

/// Everything that was reported, in the order it was reported.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Report which holds accumulated errors and warnings.
///
/// This should only exist on the main thread.
pub struct Report {
    errors: Receiver<String>,
    warnings: Receiver<String>,
    _not_send: std::marker::PhantomData<*mut ()>,
}

impl Report {
    fn new(errors: Receiver<String>, warnings: Receiver<String>) -> Self {
        Self {
            errors,
            warnings,
            _not_send: std::marker::PhantomData,
        }
    }

    /// Drains everything reported so far.
    pub fn collect(&self) -> Diagnostics {
        Diagnostics {
            errors: self.errors.try_iter().collect(),
            warnings: self.warnings.try_iter().collect(),
        }
    }

    /// Outputs all errors and warnings to stderr.
    ///
    /// Returns `false` if there were any errors, or any warnings and `warnings_as_errors`
    /// is set.
    pub fn finalize(&self, warnings_as_errors: bool) -> bool {
        use colored::Colorize as _;

        let Diagnostics { errors, warnings } = self.collect();
        let mut any_errors = !errors.is_empty();

        for warn in warnings {
            if warnings_as_errors {
                any_errors = true;
                eprintln!(
                    "{} {}",
                    "Error (warnings as errors enabled): ".red().bold(),
                    warn
                );
            } else {
                eprintln!("{} {}", "Warning: ".yellow().bold(), warn);
            }
        }

        for err in errors {
            eprintln!("{} {}", "Error: ".red().bold(), err);
        }

        !any_errors
    }
}

const _: () = {
    // `Report` must stay `!Send`, `Reporter` must be `Send`.
    //
    // `Check<T>` has one `IsNotSend` impl for every `T`, and a second one when `T: Send`.
    // Asking the compiler to infer the parameter is then ambiguous (a type error) exactly
    // when `T: Send`.
    trait IsNotSend<T> {
        fn __() {}
    }

    type False = ();

    struct True;

    struct Check<T: ?Sized>(T);

    impl<T: ?Sized> IsNotSend<True> for Check<T> {}

    impl<T: ?Sized + Send> IsNotSend<False> for Check<T> {}

    let _ = <Check<Report> as IsNotSend<_>>::__;

    fn assert_send<T: Send>() {}
    let _ = assert_send::<Reporter>;
};
