//! Built-in demo project played by `livemidi play`.

use livemidi_core::{Action, Instrument, Result, Session};

/// A four bar groove: drums, bass and piano chords with a short melody.
pub fn setup(session: &mut Session) -> Result<()> {
    session.add_tracks([
        Instrument::new("drums", 9),
        Instrument::new("bass", 1),
        Instrument::new("piano", 0),
    ]);

    if let Some((drums, form)) = session.stage("drums") {
        drums.play(form, "*:*:@4", &Action::note("C2").hold(0.25))?;
        drums.play(form, "*:*:5,13", &Action::note("D2").velocity(110).hold(0.25))?;
        drums.play(form, "*:*:@2", &Action::note("F#2").velocity(60).hold(0.25))?;
    }

    if let Some((bass, form)) = session.stage("bass") {
        let roots = [("1", "C2"), ("2", "A1"), ("3", "F1"), ("4", "G1")];
        for (bar, root) in roots {
            bass.pattern(
                form,
                &format!("*:{bar}:1"),
                &Action::note(root).velocity(90),
                &[1.5, 0.5, -1.0, 1.0, 2.0],
            )?;
        }
    }

    if let Some((piano, form)) = session.stage("piano") {
        let chords = [("1", "C4M"), ("2", "A3m"), ("3", "F3M"), ("4", "G3M")];
        for (bar, chord) in chords {
            piano.at(
                form,
                &format!("*:{bar}:1"),
                &[Action::chord(chord).hold(3.0).velocity(80), Action::sustain(8.0)],
            )?;
        }
        piano.sequence(
            form,
            "*:2:9",
            &[
                Action::note("E5").hold(0.5),
                Action::note("D5").hold(0.5),
                Action::note("C5").hold(1.0),
                Action::pause(0.5),
                Action::note("A4").hold(1.5),
            ],
        )?;
        piano.rest(form, "1:4:13", "1:4:16")?;
    }

    Ok(())
}
