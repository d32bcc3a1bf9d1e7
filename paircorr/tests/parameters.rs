use paircorr::{ComplexCF, Error, FloatCF, LocalDensity, NearestNeighbors, Rdf};
use paircorr::{CorrelationParameters, LocalDensityParameters, NearestNeighborsParameters, RdfParameters};

#[test]
fn parameters_round_trip() {
    let parameters = r#"{"max_radius":2.5,"bin_width":0.1}"#;
    assert_eq!(FloatCF::from_json(parameters).unwrap().parameters().unwrap(), parameters);
    assert_eq!(ComplexCF::from_json(parameters).unwrap().parameters().unwrap(), parameters);
    assert_eq!(Rdf::from_json(parameters).unwrap().parameters().unwrap(), parameters);

    let parameters = r#"{"cutoff":1.5,"volume":0.3,"diameter":1.0}"#;
    assert_eq!(LocalDensity::from_json(parameters).unwrap().parameters().unwrap(), parameters);

    let parameters = r#"{"max_radius":1.0,"n_neighbors":12}"#;
    assert_eq!(NearestNeighbors::from_json(parameters).unwrap().parameters().unwrap(), parameters);
}

#[test]
fn invalid_json() {
    assert!(matches!(Rdf::from_json("{"), Err(Error::Json(_))));
    assert!(matches!(Rdf::from_json(r#"{"max_radius": "2.5", "bin_width": 0.1}"#), Err(Error::Json(_))));
    assert!(matches!(LocalDensity::from_json(r#"{"cutoff": 1.5, "volume": 0.3}"#), Err(Error::Json(_))));
    assert!(matches!(NearestNeighbors::from_json(r#"{"max_radius": 1.0, "n_neighbors": -2}"#), Err(Error::Json(_))));

    let error = Rdf::from_json(r#"{"max_radius": 1.0, "bin_width": 0.1, "n_bins": 3}"#).unwrap_err();
    assert!(error.to_string().starts_with("json error: "));
    assert!(std::error::Error::source(&error).is_some());

    let error = Rdf::from_json(r#"{"max_radius": 1.0, "bin_width": 0.0}"#).unwrap_err();
    assert_eq!(error.to_string(), "invalid parameter: bin_width must be positive and finite, got 0");
    assert!(std::error::Error::source(&error).is_none());
}

#[test]
fn json_schema() {
    let check_schema = |schema: schemars::schema::RootSchema, properties: &[&str]| {
        let schema = serde_json::to_value(&schema).unwrap();
        let schema_properties = schema["properties"].as_object().unwrap();
        assert_eq!(schema_properties.len(), properties.len());
        for property in properties {
            assert!(schema_properties.contains_key(*property), "missing {} in schema", property);
        }
        assert_eq!(schema["additionalProperties"], false);
    };

    check_schema(schemars::schema_for!(CorrelationParameters), &["max_radius", "bin_width"]);
    check_schema(schemars::schema_for!(RdfParameters), &["max_radius", "bin_width"]);
    check_schema(schemars::schema_for!(LocalDensityParameters), &["cutoff", "volume", "diameter"]);
    check_schema(schemars::schema_for!(NearestNeighborsParameters), &["max_radius", "n_neighbors"]);
}
