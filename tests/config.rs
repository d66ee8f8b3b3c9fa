mod common;

use towersim::Config;

const FLOORS: &str = r#"
[[building.floors]]
number = 0
label = "L"
units = [{ id = "L1", position = 0.2 }]

[[building.floors]]
number = 1
units = [{ id = "0101", position = 0.3 }]
"#;

const AMENITY: &str = r#"
[[building.amenities]]
name = "Gym"
category = "fitness"
floor = 1
capacity = 4
position = 0.7
"#;

const PERSONA: &str = r#"
[[personas]]
name = "tenant"
rules = []
"#;

fn document(top: &str, building: &str, personas: &str) -> String {
    format!("{top}\n[building]\nname = \"Check Tower\"\n{building}\n{personas}")
}

fn rejected(text: &str, reason: &str) {
    let error = Config::from_toml_str(text).expect_err("config must be rejected");
    let chain = format!("{error:#}");
    assert!(chain.contains(reason), "expected {reason:?} in {chain:?}");
}

#[test]
fn valid_documents_load() {
    Config::from_toml_str(&document("", &format!("{FLOORS}{AMENITY}"), PERSONA))
        .expect("minimal config must load");
    Config::from_toml_str(common::TRIP).expect("trip config must load");
    Config::from_toml_str(common::CROWD).expect("crowd config must load");
    Config::builtin().expect("builtin config must load");
}

#[test]
fn start_minute_must_fall_on_a_tick() {
    let building = format!("{FLOORS}{AMENITY}");
    rejected(
        &document("start_minute = 542", &building, PERSONA),
        "multiple of 5",
    );
    rejected(
        &document("start_minute = 1440", &building, PERSONA),
        "invalid start minute",
    );
    Config::from_toml_str(&document("start_minute = 545", &building, PERSONA))
        .expect("aligned start must load");
}

#[test]
fn bad_buildings_are_fatal() {
    let duplicate_unit = r#"
[[building.floors]]
number = 0
units = [{ id = "A", position = 0.2 }, { id = "A", position = 0.6 }]
"#;
    rejected(&document("", duplicate_unit, PERSONA), "unit A is declared more than once");

    let duplicate_floor = format!("{FLOORS}\n[[building.floors]]\nnumber = 1\n");
    rejected(&document("", &duplicate_floor, PERSONA), "floor 1 is described more than once");

    let missing_floor = format!("{FLOORS}{}", AMENITY.replace("floor = 1", "floor = 7"));
    rejected(&document("", &missing_floor, PERSONA), "amenity Gym is on a missing floor");

    let zero_capacity = format!("{FLOORS}{}", AMENITY.replace("capacity = 4", "capacity = 0"));
    rejected(&document("", &zero_capacity, PERSONA), "invalid capacity of amenity Gym");

    let duplicate_amenity = format!("{FLOORS}{AMENITY}{AMENITY}");
    rejected(
        &document("", &duplicate_amenity, PERSONA),
        "amenity Gym is declared more than once",
    );

    let closed_all_day = format!("{FLOORS}{AMENITY}open = 600\nclose = 600\n");
    rejected(&document("", &closed_all_day, PERSONA), "invalid opening time of amenity Gym");

    let inverted_typical = format!(
        "{FLOORS}\n[building.typical]\nfirst = 9\nlast = 3\nunits = [{{ suffix = \"A\", position = 0.5 }}]\n"
    );
    rejected(&document("", &inverted_typical, PERSONA), "typical floors must be ordered");
}

#[test]
fn bad_catalogs_are_fatal() {
    let building = format!("{FLOORS}{AMENITY}");

    rejected(
        &document("", &building, &format!("{PERSONA}{PERSONA}")),
        "persona tenant is declared more than once",
    );
    rejected(
        &document("personas = []", &building, ""),
        "catalog must have at least one persona",
    );
    rejected(
        &document("", &building, &PERSONA.replace("rules = []", "weight = 0.0\nrules = []")),
        "invalid weight of persona tenant",
    );
}

#[test]
fn bad_tunables_are_fatal() {
    let building = format!("{FLOORS}{AMENITY}");
    rejected(
        &document("[elevator]\ncapacity = 0", &building, PERSONA),
        "invalid elevator capacity",
    );
    rejected(
        &document("[mood]\ninitial_min = 0.8\ninitial_max = 0.4", &building, PERSONA),
        "invalid maximum initial mood",
    );
    rejected(
        &document("[population]\noccupancy = 1.5", &building, PERSONA),
        "invalid occupancy",
    );
}
