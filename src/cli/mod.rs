#![forbid(unsafe_code)]

pub mod help;


#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub enum TshAction {
    Help,
    #[default]
    Run,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct TshOptions {
    /// Show verbose job diagnostics.
    pub verbose: bool,
    /// Do not print a prompt; useful when driving the shell from a script.
    pub no_prompt: bool,
    // resulting action enum
    pub action: TshAction,
    help: bool,
}

impl TshOptions {
    /// split combined shorthand options and map long options to their short form
    fn normalize_arguments<I>(iter: I) -> Result<Vec<char>, String>
    where
        I: IntoIterator<Item = String>,
    {
        // the first argument is the shell itself - so we can skip it
        let mut processed = vec![];

        for arg in iter.into_iter().skip(1) {
            match arg.as_str() {
                "--help" => processed.push('h'),
                "--verbose" => processed.push('v'),
                "--no-prompt" => processed.push('p'),
                long_arg if long_arg.starts_with("--") => {
                    Err(format!("invalid option '{long_arg}'"))?;
                }
                short_arg if short_arg.starts_with('-') && short_arg.len() > 1 => {
                    processed.extend(short_arg[1..].chars());
                }
                argument => {
                    Err(format!("unexpected argument '{argument}'"))?;
                }
            }
        }

        Ok(processed)
    }

    /// parse command line arguments from the environment and handle errors
    pub fn from_env() -> Result<TshOptions, String> {
        Self::try_parse_from(std::env::args())
    }

    /// parse an iterator over command line arguments
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = T>,
        T: Into<String> + Clone,
    {
        let mut options = TshOptions::default();

        for flag in Self::normalize_arguments(iter.into_iter().map(Into::into))? {
            match flag {
                'h' => {
                    options.help = true;
                }
                'v' => {
                    options.verbose = true;
                }
                'p' => {
                    options.no_prompt = true;
                }
                option => {
                    Err(format!("invalid option '-{option}'"))?;
                }
            }
        }

        if options.help {
            options.action = TshAction::Help;
        }

        Ok(options)
    }
}
