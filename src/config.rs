//! Parsed command-line configuration: which object files to load.

#[derive(Debug, PartialEq)]
pub struct Config {
    pub image_paths: Vec<String>,
}

impl Config {
    pub fn with(image_paths: Vec<String>) -> Result<Self, &'static str> {
        if image_paths.is_empty() {
            return Err("not enough arguments");
        }

        Ok(Self { image_paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_valid_arguments() {
        let config = Config::with(vec![String::from("program.obj")]).unwrap();
        assert_eq!(config.image_paths, vec![String::from("program.obj")]);
    }

    #[test]
    fn config_multiple_images() {
        let config = Config::with(vec![
            String::from("a.obj"),
            String::from("b.obj"),
        ])
        .unwrap();

        assert_eq!(config.image_paths.len(), 2);
    }

    #[test]
    fn config_not_enough_arguments() {
        assert_eq!(Config::with(vec![]), Err("not enough arguments"));
    }
}
