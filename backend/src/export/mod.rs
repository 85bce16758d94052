//! Result export as CSV or streamed JSON.
//!
//! Both formats share one record layout: entrance columns, the task's input
//! values for the job type, then the caller's additional columns.

use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use crate::error::ExportResult;
use crate::models::additional_data::{
    KEY_BUILDING_ID, KEY_LOCALITY, KEY_MUNICIPALITY_CODE, KEY_POSTAL_CODE, KEY_STREET,
};
use crate::models::{JobType, ResolverJob, ResolverResult, ResultId};

/// Columns every CSV export starts with.
pub const FIXED_COLUMNS: [&str; 12] = [
    "id",
    "confidence",
    "building_id",
    "entrance_id",
    "municipality_code",
    "postal_code",
    "locality",
    "street_name",
    "house_number",
    "latitude",
    "longitude",
    "match_type",
];

pub const USERDATA_PREFIX: &str = "userdata.";

/// Input echo columns of a job type, with the data key each reads from.
pub fn input_columns(job_type: JobType) -> &'static [(&'static str, &'static str)] {
    match job_type {
        JobType::BuildingIds => &[("input_egid", KEY_BUILDING_ID)],
        JobType::MunicipalitiesCodes => &[("input_municipality_code", KEY_MUNICIPALITY_CODE)],
        JobType::AddressSearch => &[
            ("input_street_housenumber", KEY_STREET),
            ("input_postal_code", KEY_POSTAL_CODE),
            ("input_locality", KEY_LOCALITY),
        ],
        JobType::GeoJson => &[],
    }
}

/// Export view of one result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord<'a> {
    pub id: ResultId,
    pub confidence: f64,
    pub building_id: Option<&'a str>,
    pub entrance_id: Option<&'a str>,
    pub municipality_code: Option<&'a str>,
    pub postal_code: Option<&'a str>,
    pub locality: Option<&'a str>,
    pub street_name: Option<&'a str>,
    pub house_number: Option<&'a str>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub match_type: String,
    pub input: BTreeMap<&'static str, &'a str>,
    pub userdata: BTreeMap<&'a str, &'a str>,
}

impl<'a> ResultRecord<'a> {
    pub fn new(result: &'a ResolverResult, job_type: JobType) -> Self {
        let entrance = result.entrance.as_ref();
        let coordinate = |value: Option<f64>| value.filter(|v| v.is_finite());
        Self {
            id: result.id,
            confidence: result.confidence.as_float(),
            building_id: entrance.map(|e| e.building_id.as_str()),
            entrance_id: entrance.map(|e| e.entrance_id.as_str()),
            municipality_code: entrance.map(|e| e.municipality_code.as_str()),
            postal_code: entrance.map(|e| e.postal_code.as_str()),
            locality: entrance.map(|e| e.locality.as_str()),
            street_name: entrance.map(|e| e.street_name.as_str()),
            house_number: entrance.map(|e| e.house_number.as_str()),
            latitude: coordinate(entrance.map(|e| e.latitude)),
            longitude: coordinate(entrance.map(|e| e.longitude)),
            match_type: result.match_type.to_string(),
            input: input_columns(job_type)
                .iter()
                .map(|(column, key)| (*column, result.additional_data.get(key).unwrap_or_default()))
                .collect(),
            userdata: result.additional_data.public_view(),
        }
    }

    fn csv_row(&self, job_type: JobType, additional_columns: &[String]) -> Vec<String> {
        let text = |value: Option<&str>| value.unwrap_or_default().to_string();
        let number = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();

        let mut row = vec![
            self.id.to_string(),
            self.confidence.to_string(),
            text(self.building_id),
            text(self.entrance_id),
            text(self.municipality_code),
            text(self.postal_code),
            text(self.locality),
            text(self.street_name),
            text(self.house_number),
            number(self.latitude),
            number(self.longitude),
            self.match_type.clone(),
        ];
        row.extend(
            input_columns(job_type)
                .iter()
                .map(|(column, _)| text(self.input.get(column).copied())),
        );
        row.extend(
            additional_columns
                .iter()
                .map(|column| text(self.userdata.get(column.as_str()).copied())),
        );
        row
    }
}

/// CSV header for a job.
pub fn csv_header(job: &ResolverJob) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(input_columns(job.job_type).iter().map(|(c, _)| c.to_string()))
        .chain(
            job.metadata
                .additional_columns
                .iter()
                .map(|c| format!("{}{}", USERDATA_PREFIX, c)),
        )
        .collect()
}

/// Write a job's results as CSV.
pub fn write_csv<'a, W, I>(job: &ResolverJob, results: I, writer: W) -> ExportResult<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a ResolverResult>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(csv_header(job))?;

    let mut count = 0;
    for result in results {
        let record = ResultRecord::new(result, job.job_type);
        csv_writer.write_record(record.csv_row(job.job_type, &job.metadata.additional_columns))?;
        count += 1;
    }
    csv_writer.flush()?;
    Ok(count)
}

pub const JSON_OPEN: &[u8] = b"{\"results\":[";
pub const JSON_CLOSE: &[u8] = b"]}";

/// One serialized result, preceded by a comma unless it is the first.
pub fn json_item(result: &ResolverResult, job_type: JobType, first: bool) -> ExportResult<Vec<u8>> {
    let mut chunk = if first { Vec::new() } else { vec![b','] };
    serde_json::to_writer(&mut chunk, &ResultRecord::new(result, job_type))?;
    Ok(chunk)
}

/// `{"results":[...]}` as a sequence of chunks, one per result.
pub fn json_chunks<'a, I>(job_type: JobType, results: I) -> impl Iterator<Item = ExportResult<Vec<u8>>> + 'a
where
    I: IntoIterator<Item = &'a ResolverResult>,
    I::IntoIter: 'a,
{
    std::iter::once(Ok(JSON_OPEN.to_vec()))
        .chain(
            results
                .into_iter()
                .enumerate()
                .map(move |(i, result)| json_item(result, job_type, i == 0)),
        )
        .chain(std::iter::once(Ok(JSON_CLOSE.to_vec())))
}

/// Write a job's results as JSON, one result at a time.
pub fn write_json<'a, W, I>(job_type: JobType, results: I, mut writer: W) -> ExportResult<()>
where
    W: Write,
    I: IntoIterator<Item = &'a ResolverResult>,
    I::IntoIter: 'a,
{
    for chunk in json_chunks(job_type, results) {
        writer.write_all(&chunk?)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::additional_data::DataRow;
    use crate::models::entrance::fixtures::entrance;
    use crate::models::{
        AdditionalData, Confidence, JobMetadata, MatchType, ResolverTask, TaskPayload,
    };
    use chrono::Duration;

    fn job() -> ResolverJob {
        let metadata = JobMetadata {
            additional_columns: vec!["ref".to_string(), "note".to_string()],
            ..Default::default()
        };
        ResolverJob::new(JobType::BuildingIds, metadata, Duration::days(1))
    }

    fn data(reference: &str) -> AdditionalData {
        AdditionalData::create(DataRow::from([
            ("ref".to_string(), reference.to_string()),
            (KEY_BUILDING_ID.to_string(), "100".to_string()),
        ]))
    }

    fn results(job: &ResolverJob) -> Vec<ResolverResult> {
        let matched = ResolverResult::matched(
            job.id,
            entrance("100", "0", "Bundesplatz", "3"),
            Confidence::from_int(95).unwrap(),
            MatchType::new("buildingId"),
            data("A"),
        );
        let task = ResolverTask::new(job.id, TaskPayload::BuildingId("7".into()), Confidence::MAX, data("B"));
        vec![matched, ResolverResult::unmatched(&task)]
    }

    #[test]
    fn test_csv_columns() {
        let job = job();
        let results = results(&job);
        let mut out = Vec::new();
        assert_eq!(write_csv(&job, &results, &mut out).unwrap(), 2);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,confidence,building_id,entrance_id,municipality_code,postal_code,locality,\
             street_name,house_number,latitude,longitude,match_type,input_egid,userdata.ref,userdata.note"
        );
        let matched: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(matched[1], "0.95");
        assert_eq!(matched[2], "100");
        assert_eq!(matched[11], "buildingId");
        assert_eq!(&matched[12..], ["100", "A", ""]);

        let unmatched: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(unmatched[1], "0");
        assert_eq!(unmatched[2], "");
        assert_eq!(unmatched[11], "nomatch");
        assert_eq!(unmatched[13], "B");
    }

    #[test]
    fn test_json_document() {
        let job = job();
        let results = results(&job);
        let mut out = Vec::new();
        write_json(job.job_type, &results, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let items = value["results"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["confidence"], 0.95);
        assert_eq!(items[0]["buildingId"], "100");
        assert_eq!(items[0]["userdata"]["ref"], "A");
        assert_eq!(items[0]["input"]["input_egid"], "100");
        assert!(items[1]["buildingId"].is_null());
        // Internal keys never leak
        assert!(items[0]["userdata"].get(KEY_BUILDING_ID).is_none());
    }

    #[test]
    fn test_empty_json() {
        let mut out = Vec::new();
        write_json(JobType::GeoJson, &Vec::<ResolverResult>::new(), &mut out).unwrap();
        assert_eq!(out, b"{\"results\":[]}");
    }

    #[test]
    fn test_chunk_per_result() {
        let job = job();
        let results = results(&job);
        let chunks: Vec<_> = json_chunks(job.job_type, &results).collect();
        assert_eq!(chunks.len(), 4);
    }
}
