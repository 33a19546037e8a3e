use std::sync::LazyLock;
use ustr::Ustr;

macro_rules! str_const {
    ($($name:ident = $str:literal);*; ) => {
        $(pub static $name: LazyLock<Ustr> = LazyLock::new(|| Ustr::from($str));)*
    };
}

// Keywords:
str_const! {
    FORALL = "forall";
    EXISTS = "exists";
    OR = "v";
}

// Predicate names with special meaning:
str_const! {
    IDENTITY = "=";
}

// File extensions:
str_const! {
    NATURAL_DEDUCTION_EXTENSION = "nd";
    SEQUENT_EXTENSION = "sq";
}

pub const CONFIG_FILE_NAME: &str = "lrcheck.toml";
pub const LOG_ENV_VAR: &str = "LRCHECK_LOG";
