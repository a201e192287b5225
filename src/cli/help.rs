pub const USAGE_MSG: &str = "Usage: tsh [-hvp]";

const HELP_MSG: &str = "   -h   print this message
   -v   print additional diagnostic information
   -p   do not emit a command prompt";

pub fn long_help_message() -> String {
    format!("{USAGE_MSG}\n{HELP_MSG}")
}
