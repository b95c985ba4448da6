//! Loading owner batches from JSON and CSV text.

use std::path::Path;

use crate::error::ResolveError;
use crate::model::{BusinessType, OwnerRecord};

/// A JSON array of owner records (camelCase keys, snake_case accepted).
pub fn records_from_json(data: &str) -> Result<Vec<OwnerRecord>, ResolveError> {
    serde_json::from_str(data).map_err(|e| ResolveError::InputParse(format!("JSON: {e}")))
}

/// Header-driven CSV. Unknown columns are ignored, empty cells are absent,
/// and `properties` holds `;`-separated ids.
pub fn records_from_csv(data: &str) -> Result<Vec<OwnerRecord>, ResolveError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ResolveError::InputParse(format!("CSV header: {e}")))?
        .iter()
        .map(canonical_column)
        .collect();

    if !headers.iter().any(|h| h == "name" || h == "businessname") {
        return Err(ResolveError::InputParse(
            "CSV header must include a name or businessName column".into(),
        ));
    }

    let mut records = Vec::new();
    for (row_idx, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ResolveError::InputParse(format!("CSV row {}: {e}", row_idx + 1)))?;

        let mut record = OwnerRecord::default();
        for (header, value) in headers.iter().zip(row.iter()) {
            if value.is_empty() {
                continue;
            }
            let text = Some(value.to_string());
            match header.as_str() {
                "id" => record.id = text,
                "name" => record.name = text,
                "businessname" => record.business_name = text,
                "address" => record.address = text,
                "city" => record.city = text,
                "state" => record.state = text,
                "zipcode" | "zip" => record.zip_code = text,
                "phone" => record.phone = text,
                "email" => record.email = text,
                "ssn" => record.ssn = text,
                "ein" => record.ein = text,
                "dateofbirth" | "dob" => record.date_of_birth = text,
                "businesstype" => record.business_type = Some(BusinessType::from(value.to_string())),
                "datasource" | "source" => record.data_source = text,
                "properties" => {
                    record.properties = value
                        .split(';')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                _ => {}
            }
        }
        records.push(record);
    }

    Ok(records)
}

/// Read a batch from disk, choosing the format by extension (`.csv`, else JSON).
pub fn load_records_file(path: &Path) -> Result<Vec<OwnerRecord>, ResolveError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| ResolveError::Io(format!("{}: {e}", path.display())))?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        records_from_csv(&data)
    } else {
        records_from_json(&data)
    }
}

/// `businessName`, `business_name` and `Business Name` all map to `businessname`.
fn canonical_column(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}
