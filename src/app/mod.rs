pub(crate) mod cli;

mod common;

mod compilation;
pub(crate) use compilation::Command as CompilationCommand;

mod model_counting;
pub(crate) use model_counting::Command as ModelCountingCommand;

mod print_cnf;
pub(crate) use print_cnf::Command as PrintCnfCommand;
