#[cfg(test)]
pub mod test {
    use serde::{Deserialize, Serialize};

    use crate::validate::{Options, ValidationFailure};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct DbOptions {
        pub host: String,
        pub port: u16,
    }

    impl Options for DbOptions {
        fn validate(&self) -> Vec<ValidationFailure> {
            let mut failures = Vec::new();
            if self.host.trim().is_empty() {
                failures.push(ValidationFailure::new("host is required", ["host"]));
            }
            if self.port == 0 {
                failures.push(ValidationFailure::new("port must be positive", ["port"]));
            }
            failures
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct TlsOptions {
        pub enabled: bool,
        pub min_version: String,
        pub cert: Option<String>,
    }

    impl Default for TlsOptions {
        fn default() -> Self {
            Self {
                enabled: false,
                min_version: "1.2".into(),
                cert: None,
            }
        }
    }

    impl Options for TlsOptions {}

    // -- Collections -------------------------------------------------------------

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct Item {
        pub name: String,
        pub weight: u32,
        pub note: Option<String>,
    }

    impl Default for Item {
        fn default() -> Self {
            Self {
                name: String::new(),
                weight: 1,
                note: None,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct ListOptions {
        pub title: String,
        pub tags: Vec<String>,
        pub items: Vec<Item>,
    }

    impl Options for ListOptions {}

    // -- Polymorphic shapes ------------------------------------------------------

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct BaseShape {
        #[serde(rename = "Type")]
        pub kind: String,
        pub label: String,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct CircleShape {
        #[serde(rename = "Type")]
        pub kind: String,
        pub radius: f64,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub struct SquareShape {
        #[serde(rename = "Type")]
        pub kind: String,
        pub side: f64,
    }

    impl Default for SquareShape {
        fn default() -> Self {
            Self {
                kind: "Square".into(),
                side: 1.0,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    pub enum Shape {
        CircleShape(CircleShape),
        SquareShape(SquareShape),
        Shape(BaseShape),
    }

    impl Default for Shape {
        fn default() -> Self {
            Shape::Shape(BaseShape::default())
        }
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
    pub struct Drawing {
        pub name: String,
        pub shape: Shape,
    }

    impl Options for Drawing {}
}
