//! Types used by the job/episode store.

/// Job identifier.
pub type JobId = i64;

/// Episode row identifier.
pub type EpisodeId = i64;

/// High-level job status stored as a string in the database.
/// Transitions are strictly forward: Queued → Running → terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => JobStatus::Queued,
            "running" => JobStatus::Running,
            "success" => JobStatus::Success,
            "canceled" => JobStatus::Canceled,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed | JobStatus::Canceled)
    }
}

/// Coarse pipeline stage of a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStage {
    Init,
    Resolve,
    Download,
    Postprocess,
    Done,
}

impl JobStage {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Init => "init",
            JobStage::Resolve => "resolve",
            JobStage::Download => "download",
            JobStage::Postprocess => "postprocess",
            JobStage::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "resolve" => JobStage::Resolve,
            "download" => JobStage::Download,
            "postprocess" => JobStage::Postprocess,
            "done" => JobStage::Done,
            _ => JobStage::Init,
        }
    }

    /// Baseline job percent for a stage (refined by per-episode progress
    /// while downloading).
    pub fn percent(self) -> i64 {
        match self {
            JobStage::Init => 5,
            JobStage::Resolve => 15,
            JobStage::Download => 30,
            JobStage::Postprocess => 95,
            JobStage::Done => 100,
        }
    }
}

/// Status of one episode within a job.
///
/// Ordering matters: an episode only ever moves to a status with a higher
/// rank, except Failed, which is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeStatus {
    Pending,
    ResolvingStream,
    DownloadingVideo,
    MergingVideo,
    DownloadingSubtitles,
    Complete,
    Failed,
}

impl EpisodeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EpisodeStatus::Pending => "pending",
            EpisodeStatus::ResolvingStream => "resolving_stream",
            EpisodeStatus::DownloadingVideo => "downloading_video",
            EpisodeStatus::MergingVideo => "merging_video",
            EpisodeStatus::DownloadingSubtitles => "downloading_subtitles",
            EpisodeStatus::Complete => "complete",
            EpisodeStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => EpisodeStatus::Pending,
            "resolving_stream" => EpisodeStatus::ResolvingStream,
            "downloading_video" => EpisodeStatus::DownloadingVideo,
            "merging_video" => EpisodeStatus::MergingVideo,
            "downloading_subtitles" => EpisodeStatus::DownloadingSubtitles,
            "complete" => EpisodeStatus::Complete,
            _ => EpisodeStatus::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EpisodeStatus::Complete | EpisodeStatus::Failed)
    }

    /// Forward-progress rank; Failed is reachable from anywhere.
    pub fn rank(self) -> u8 {
        match self {
            EpisodeStatus::Pending => 0,
            EpisodeStatus::ResolvingStream => 1,
            EpisodeStatus::DownloadingVideo => 2,
            EpisodeStatus::MergingVideo => 3,
            EpisodeStatus::DownloadingSubtitles => 4,
            EpisodeStatus::Complete => 5,
            EpisodeStatus::Failed => 6,
        }
    }

    /// Whether a transition to `next` respects the forward-only invariant.
    pub fn can_advance_to(self, next: EpisodeStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == EpisodeStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

/// Structured per-episode transfer fields scraped from downloader output.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

/// Full job row.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: JobId,
    pub url: String,
    pub profile: Option<String>,
    pub extra_args: Option<String>,
    pub status: JobStatus,
    pub stage: JobStage,
    pub progress_percent: i64,
    pub progress_text: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub pid: Option<i64>,
    pub log_file: Option<String>,
    pub error_message: Option<String>,
}

/// Full episode row.
#[derive(Debug, Clone)]
pub struct EpisodeRecord {
    pub id: EpisodeId,
    pub job_id: JobId,
    pub number: i64,
    pub title: Option<String>,
    pub status: EpisodeStatus,
    pub progress_percent: i64,
    pub stage_data: Option<StageData>,
    pub log_file: Option<String>,
    pub error_message: Option<String>,
}
