// src/session/commands.rs

/// Command vocabulary a streaming session issues
///
/// Templates may contain `{name}`, replaced by the association file name or
/// waveform name. Defaults follow the LAN-streaming command set of UXG-class
/// signal generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCommands {
    pub stream_off: String,
    pub stream_on: String,
    /// Binary block prefix uploading the association file
    pub windex_upload: String,
    pub windex_import: String,
    pub windex_select: String,
    /// Source, trigger and marker routing, sent in order while configuring
    pub arm: Vec<String>,
    pub header_clear: String,
    /// Block-carrying query uploading the PDW header
    pub header_query: String,
    /// Response the instrument gives for an accepted header
    pub header_ack: String,
    pub barrier: String,
    pub trigger: String,
    /// Binary block prefix uploading IQ data
    pub waveform_upload: String,
    /// Binary block prefix uploading a CSV PDW table
    pub table_upload: String,
    /// Converts an uploaded CSV PDW table into a playable stream file
    pub table_import: String,
    /// Drain the instrument error queue after configuring; any queued error aborts the session
    pub check_errors: bool,
}

impl Default for StreamCommands {
    fn default() -> Self {
        StreamCommands {
            stream_off: "stream:state off".into(),
            stream_on: "stream:state on".into(),
            windex_upload: "memory:data \"{name}.csv\", ".into(),
            windex_import: "memory:import:windex \"{name}.csv\",\"{name}\"".into(),
            windex_select: "stream:windex:select \"{name}\"".into(),
            arm: vec![
                "stream:markers:pdw1:mode stime".into(),
                "rout:trigger2:output pmarker1".into(),
                "stream:source lan".into(),
                "stream:trigger:play:file:type continuous".into(),
                "stream:trigger:play:file:type:continuous:type trigger".into(),
                "stream:trigger:play:source bus".into(),
            ],
            header_clear: "stream:external:header:clear".into(),
            header_query: "stream:external:header? ".into(),
            header_ack: "+0".into(),
            barrier: "*OPC?".into(),
            trigger: "stream:trigger:play:immediate".into(),
            waveform_upload: "memory:data \"WFM1:{name}\", ".into(),
            table_upload: "memory:data \"{name}.csv\", ".into(),
            table_import: "memory:import:stream \"{name}.csv\",\"{name}\"".into(),
            check_errors: true,
        }
    }
}

pub(crate) fn render(template: &str, name: &str) -> String {
    template.replace("{name}", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_templates() {
        let commands = StreamCommands::default();
        assert_eq!(render(&commands.windex_upload, "chirps"), "memory:data \"chirps.csv\", ");
        assert_eq!(
            render(&commands.windex_import, "chirps"),
            "memory:import:windex \"chirps.csv\",\"chirps\""
        );
        assert_eq!(render(&commands.waveform_upload, "A"), "memory:data \"WFM1:A\", ");
        assert_eq!(
            render(&commands.table_import, "basic_chirp"),
            "memory:import:stream \"basic_chirp.csv\",\"basic_chirp\""
        );
        assert_eq!(render(&commands.barrier, "ignored"), "*OPC?");
    }
}
