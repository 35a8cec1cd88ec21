//! Calendar dates on the wire as `YYYY-MM-DD`.

pub mod iso_date {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};
    use time::{format_description::well_known::Iso8601, Date};

    pub fn serialize<S: Serializer>(date: &Date, s: S) -> Result<S::Ok, S::Error> {
        let text = date.format(&Iso8601::DATE).map_err(S::Error::custom)?;
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(d)?;
        Date::parse(raw.trim(), &Iso8601::DATE)
            .map_err(|_| D::Error::custom(format!("invalid date `{raw}`, expected YYYY-MM-DD")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(date: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => super::serialize(d, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => Date::parse(raw.trim(), &Iso8601::DATE)
                    .map(Some)
                    .map_err(|_| D::Error::custom(format!("invalid date `{raw}`, expected YYYY-MM-DD"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use time::{macros::date, Date};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::iso_date")]
        on: Date,
        #[serde(default, with = "super::iso_date::option")]
        maybe: Option<Date>,
    }

    #[test]
    fn dates_use_plain_iso_form() {
        let h = Holder {
            on: date!(2024 - 09 - 01),
            maybe: None,
        };
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, r#"{"on":"2024-09-01","maybe":null}"#);

        let back: Holder = serde_json::from_str(r#"{"on":"2025-01-15","maybe":"2025-02-01"}"#).unwrap();
        assert_eq!(back.on, date!(2025 - 01 - 15));
        assert_eq!(back.maybe, Some(date!(2025 - 02 - 01)));

        let missing: Holder = serde_json::from_str(r#"{"on":"2025-01-15"}"#).unwrap();
        assert_eq!(missing.maybe, None);
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(serde_json::from_str::<Holder>(r#"{"on":"01/15/2025"}"#).is_err());
    }
}
