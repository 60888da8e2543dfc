use super::{JobStatus, TranscodeError, TranscodeRequest, TranscodeResult, TranscodeService};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_mediaconvert::config::Region;
use aws_sdk_mediaconvert::error::DisplayErrorContext;
use aws_sdk_mediaconvert::types::{
    AacCodingMode, AacSettings, AudioCodec, AudioCodecSettings, AudioDefaultSelection,
    AudioDescription, AudioSelector, ContainerSettings, ContainerType, H264RateControlMode,
    H264Settings, HlsGroupSettings, Input, JobSettings, JobStatus as MediaConvertStatus, Output,
    OutputGroup, OutputGroupSettings, OutputGroupType, VideoCodec, VideoCodecSettings,
    VideoDescription,
};
use aws_sdk_mediaconvert::Client;
use std::time::Instant;
use streamhub_core::models::{RenditionLadder, Rung};

const AUDIO_SELECTOR: &str = "Audio Selector 1";

/// AWS Elemental MediaConvert client producing the HLS ladder.
#[derive(Clone)]
pub struct MediaConvertTranscoder {
    client: Client,
    bucket: String,
    role_arn: String,
    queue: Option<String>,
}

impl MediaConvertTranscoder {
    /// # Arguments
    /// * `region` - AWS region of the MediaConvert account endpoint
    /// * `endpoint_url` - account-specific MediaConvert endpoint, if required
    /// * `bucket` - bucket holding both originals and transcoded output
    /// * `role_arn` - IAM role MediaConvert assumes to read and write the bucket
    pub async fn new(
        region: String,
        endpoint_url: Option<String>,
        bucket: String,
        role_arn: String,
        queue: Option<String>,
    ) -> TranscodeResult<Self> {
        if role_arn.is_empty() {
            return Err(TranscodeError::ConfigError(
                "MediaConvert role ARN is empty".into(),
            ));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_mediaconvert::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
            role_arn,
            queue,
        })
    }

    fn rung_output(rung: &Rung) -> Output {
        let h264 = H264Settings::builder()
            .rate_control_mode(H264RateControlMode::Qvbr)
            .max_bitrate(rung.max_bitrate_kbps * 1000)
            .build();

        let video = VideoDescription::builder()
            .width(rung.width)
            .height(rung.height)
            .codec_settings(
                VideoCodecSettings::builder()
                    .codec(VideoCodec::H264)
                    .h264_settings(h264)
                    .build(),
            )
            .build();

        let aac = AacSettings::builder()
            .bitrate(RenditionLadder::AUDIO_BITRATE)
            .sample_rate(RenditionLadder::AUDIO_SAMPLE_RATE)
            .coding_mode(AacCodingMode::CodingMode20)
            .build();

        let audio = AudioDescription::builder()
            .audio_source_name(AUDIO_SELECTOR)
            .codec_settings(
                AudioCodecSettings::builder()
                    .codec(AudioCodec::Aac)
                    .aac_settings(aac)
                    .build(),
            )
            .build();

        Output::builder()
            .name_modifier(rung.name_modifier)
            .container_settings(
                ContainerSettings::builder()
                    .container(ContainerType::M3U8)
                    .build(),
            )
            .video_description(video)
            .audio_descriptions(audio)
            .build()
    }

    fn job_settings(&self, request: &TranscodeRequest) -> JobSettings {
        let destination = format!(
            "s3://{}/{}",
            self.bucket,
            RenditionLadder::output_prefix(request.media_id)
        );

        let hls = HlsGroupSettings::builder()
            .destination(destination)
            .segment_length(RenditionLadder::SEGMENT_SECONDS)
            .min_segment_length(0)
            .build();

        let group = OutputGroup::builder()
            .name("HLS")
            .output_group_settings(
                OutputGroupSettings::builder()
                    .r#type(OutputGroupType::HlsGroupSettings)
                    .hls_group_settings(hls)
                    .build(),
            )
            .set_outputs(Some(
                RenditionLadder::RUNGS.iter().map(Self::rung_output).collect(),
            ))
            .build();

        let input = Input::builder()
            .file_input(format!("s3://{}/{}", self.bucket, request.input_key))
            .audio_selectors(
                AUDIO_SELECTOR,
                AudioSelector::builder()
                    .default_selection(AudioDefaultSelection::Default)
                    .build(),
            )
            .build();

        JobSettings::builder()
            .inputs(input)
            .output_groups(group)
            .build()
    }
}

#[async_trait]
impl TranscodeService for MediaConvertTranscoder {
    async fn submit_job(&self, request: &TranscodeRequest) -> TranscodeResult<String> {
        let start = Instant::now();
        let output = self
            .client
            .create_job()
            .role(&self.role_arn)
            .set_queue(self.queue.clone())
            .settings(self.job_settings(request))
            .user_metadata("mediaId", request.media_id.to_string())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    media_id = %request.media_id,
                    input_key = %request.input_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "MediaConvert create_job failed"
                );
                TranscodeError::SubmitFailed(DisplayErrorContext(&e).to_string())
            })?;

        let job_id = output
            .job()
            .and_then(|job| job.id())
            .ok_or_else(|| TranscodeError::SubmitFailed("response carried no job id".into()))?
            .to_string();

        tracing::info!(
            media_id = %request.media_id,
            job_id = %job_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MediaConvert job submitted"
        );

        Ok(job_id)
    }

    async fn job_status(&self, job_id: &str) -> TranscodeResult<JobStatus> {
        let start = Instant::now();
        let output = self
            .client
            .get_job()
            .id(job_id)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    job_id = %job_id,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "MediaConvert get_job failed"
                );
                TranscodeError::StatusFailed(DisplayErrorContext(&e).to_string())
            })?;

        let status = output
            .job()
            .and_then(|job| job.status())
            .ok_or_else(|| TranscodeError::JobNotFound(job_id.to_string()))?;

        let mapped = match status {
            MediaConvertStatus::Submitted => JobStatus::Submitted,
            MediaConvertStatus::Progressing => JobStatus::Progressing,
            MediaConvertStatus::Complete => JobStatus::Complete,
            MediaConvertStatus::Error => JobStatus::Error,
            MediaConvertStatus::Canceled => JobStatus::Canceled,
            other => {
                return Err(TranscodeError::StatusFailed(format!(
                    "unknown job status {}",
                    other.as_str()
                )))
            }
        };

        tracing::debug!(
            job_id = %job_id,
            status = ?mapped,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "MediaConvert job status"
        );

        Ok(mapped)
    }
}
