use rand::{Rng, RngCore};

use crate::models::{CurrentCallSeed, SimConfig, TimestampedLine, Transcript};

const MOCK_CALLS: [(&str, &str, &str, &str); 10] = [
    (
        "My kitchen is on fire and the smoke is spreading. We are at 41 Birch Lane, unit 2.",
        "2026-01-10T09:15:00Z",
        "V6B1A1",
        "00:35",
    ),
    (
        "A man with a gun is robbing the pharmacy on Queen Street. He is yelling at the staff!",
        "2026-01-10T14:30:00Z",
        "M5H2N2",
        "03:52",
    ),
    (
        "The people upstairs have been playing loud music since midnight. Nobody can sleep.",
        "2026-01-10T02:00:00Z",
        "K1A0B1",
        "01:20",
    ),
    (
        "Someone just grabbed my wallet on the bus. He got off at the last stop.",
        "2026-01-10T18:45:00Z",
        "H2Y1C6",
        "00:19",
    ),
    (
        "My car was stolen from the lot behind the library. It is a grey pickup.",
        "2026-01-10T19:00:00Z",
        "V6B4Y8",
        "00:11",
    ),
    (
        "Somebody broke the back door and I can hear them in the basement. Please hurry.",
        "2026-01-10T22:15:00Z",
        "R3B0N2",
        "00:09",
    ),
    (
        "There is a crowd pushing at the stadium gate and people are falling down.",
        "2026-01-10T20:30:00Z",
        "T2P2V6",
        "00:44",
    ),
    (
        "An old man collapsed in the grocery store. He is breathing but not answering.",
        "2026-01-10T11:05:00Z",
        "K1P1J1",
        "01:02",
    ),
    (
        "There is smoke coming out of the warehouse on Dock Road. I think it is a fire.",
        "2026-01-10T16:40:00Z",
        "B3H4R2",
        "00:27",
    ),
    (
        "Two guys are fighting outside the bar. One of them has a bottle.",
        "2026-01-10T01:30:00Z",
        "S4P3Y2",
        "00:58",
    ),
];

pub fn mock_transcripts() -> Vec<Transcript> {
    MOCK_CALLS
        .iter()
        .map(|(text, time, location, duration)| Transcript {
            text: text.to_string(),
            time: time.to_string(),
            location: location.to_string(),
            duration: duration.to_string(),
        })
        .collect()
}

fn random_mock(rng: &mut dyn RngCore) -> Transcript {
    let (text, time, location, duration) = MOCK_CALLS[rng.gen_range(0..MOCK_CALLS.len())];
    Transcript {
        text: text.to_string(),
        time: time.to_string(),
        location: location.to_string(),
        duration: duration.to_string(),
    }
}

/// Transcripts to submit to the remote queue at start. Custom calls replace
/// the generated ones.
pub fn incoming_transcripts(config: &SimConfig, rng: &mut dyn RngCore) -> Vec<Transcript> {
    if !config.custom_incoming_calls.is_empty() {
        return config
            .custom_incoming_calls
            .iter()
            .map(|call| call.transcript.clone())
            .collect();
    }
    (0..config.incoming_calls).map(|_| random_mock(rng)).collect()
}

/// Current calls for one configuration generation, in assignment order.
pub fn current_call_seeds(
    config: &SimConfig,
    generation: u64,
    rng: &mut dyn RngCore,
) -> Vec<CurrentCallSeed> {
    let transcripts: Vec<Transcript> = if config.custom_current_calls.is_empty() {
        (0..config.initial_busy_dispatchers)
            .map(|_| random_mock(rng))
            .collect()
    } else {
        config
            .custom_current_calls
            .iter()
            .map(|call| call.transcript.clone())
            .collect()
    };

    transcripts
        .into_iter()
        .enumerate()
        .map(|(idx, transcript)| CurrentCallSeed {
            client_id: format!("cc-{}-{}", generation, idx + 1),
            transcript,
        })
        .collect()
}

/// Splits a transcript into sentences and spreads timestamps across the call
/// duration. Custom calls get a single line at `0:15`.
pub fn timestamped_lines(transcript: &Transcript, custom: bool) -> Vec<TimestampedLine> {
    if custom {
        return vec![TimestampedLine {
            text: transcript.text.clone(),
            time: "0:15".to_string(),
        }];
    }

    let chunks = sentences(&transcript.text);
    if chunks.is_empty() {
        return vec![TimestampedLine {
            text: transcript.text.clone(),
            time: "0:01".to_string(),
        }];
    }

    let total = parse_duration_secs(&transcript.duration).filter(|secs| *secs >= 2);
    let count = chunks.len() as u64;
    let mut last = 0u64;
    chunks
        .into_iter()
        .enumerate()
        .map(|(idx, text)| {
            let idx = idx as u64;
            let mut secs = match total {
                Some(total) => ((idx + 1) * total / (count + 1)).max(1),
                None => 1 + idx * 5,
            };
            secs = secs.max(last + 1);
            last = secs;
            TimestampedLine {
                text,
                time: format!("{}:{:02}", secs / 60, secs % 60),
            }
        })
        .collect()
}

fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            push_trimmed(&mut out, &current);
            current.clear();
        }
    }
    push_trimmed(&mut out, &current);
    out
}

fn push_trimmed(out: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// `MM:SS` or `HH:MM:SS`.
fn parse_duration_secs(raw: &str) -> Option<u64> {
    let parts: Vec<u64> = raw
        .split(':')
        .map(|part| part.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [mm, ss] => Some(mm * 60 + ss),
        [hh, mm, ss] => Some(hh * 3600 + mm * 60 + ss),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomCall;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn transcript(text: &str, duration: &str) -> Transcript {
        Transcript {
            text: text.to_string(),
            time: "12:00".to_string(),
            location: "A1A1A1".to_string(),
            duration: duration.to_string(),
        }
    }

    #[test]
    fn seeds_get_unique_generation_scoped_ids() {
        let config = SimConfig {
            initial_busy_dispatchers: 3,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let seeds = current_call_seeds(&config, 7, &mut rng);
        let ids: Vec<&str> = seeds.iter().map(|s| s.client_id.as_str()).collect();
        assert_eq!(ids, vec!["cc-7-1", "cc-7-2", "cc-7-3"]);
    }

    #[test]
    fn custom_current_calls_override_count() {
        let config = SimConfig {
            initial_busy_dispatchers: 5,
            custom_current_calls: vec![CustomCall {
                transcript: transcript("Help, my door is jammed.", "00:10"),
            }],
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let seeds = current_call_seeds(&config, 1, &mut rng);
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].transcript.text, "Help, my door is jammed.");
    }

    #[test]
    fn lines_are_spread_over_duration_and_increase() {
        let lines = timestamped_lines(&transcript("One. Two! Three?", "00:40"), false);
        let times: Vec<&str> = lines.iter().map(|l| l.time.as_str()).collect();
        assert_eq!(times, vec!["0:10", "0:20", "0:30"]);
        assert_eq!(lines[1].text, "Two!");
    }

    #[test]
    fn short_or_unparsable_duration_uses_five_second_steps() {
        let lines = timestamped_lines(&transcript("One. Two.", "n/a"), false);
        let times: Vec<&str> = lines.iter().map(|l| l.time.as_str()).collect();
        assert_eq!(times, vec!["0:01", "0:06"]);
    }

    #[test]
    fn custom_calls_get_single_line() {
        let lines = timestamped_lines(&transcript("One. Two.", "00:40"), true);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].time, "0:15");
    }

    #[test]
    fn parses_both_duration_formats() {
        assert_eq!(parse_duration_secs("03:52"), Some(232));
        assert_eq!(parse_duration_secs("1:00:05"), Some(3605));
        assert_eq!(parse_duration_secs("abc"), None);
    }
}
