//! The setup form served at `/`.

const TEMPLATE: &str = r##"<html>
<head>
  <title>Dokku Setup</title>
  <link rel="stylesheet" href="//netdna.bootstrapcdn.com/bootstrap/3.0.0/css/bootstrap.min.css" />
  <script src="//ajax.googleapis.com/ajax/libs/jquery/1.10.2/jquery.min.js"></script>
</head>
<body>
  <div class="container" style="width: 640px;">
  <form id="form" role="form">
    <h1>Dokku Setup <small>{{version}}</small></h1>
    <div class="form-group">
      <h3><small style="text-transform: uppercase;">Admin Access</small></h3>
      <label for="key">Public Key</label><br />
      <textarea class="form-control" name="key" rows="7" id="key">{{admin_key}}</textarea>
    </div>
    <div class="form-group">
      <h3><small style="text-transform: uppercase;">Hostname Configuration</small></h3>
      <div class="form-group">
        <label for="hostname">Hostname</label>
        <input class="form-control" type="text" id="hostname" name="hostname" value="{{hostname}}" />
      </div>
      <div class="checkbox">
        <label><input id="vhost" name="vhost" type="checkbox" value="true"> Use <abbr title="Nginx will be run on port 80 and backend to your apps based on hostname">virtualhost naming</abbr> for apps</label>
      </div>
      <p>Your app URLs will look like:</p>
      <pre id="example">http://hostname:port</pre>
    </div>
    <button type="button" onclick="setup()" class="btn btn-primary">Finish Setup</button> <span style="padding-left: 20px;" id="result"></span>
  </form>
  </div>
  <div id="error-output"></div>
  <script>
    function setup() {
      if ($.trim($("#key").val()) == "") {
        alert("Your admin public key cannot be blank.")
        return
      }
      if ($.trim($("#hostname").val()) == "") {
        alert("Your hostname cannot be blank.")
        return
      }
      data = $("#form").serialize()
      $("input,textarea,button").prop("disabled", true);
      $.post('/setup', data)
        .done(function() {
          $("#result").html("Success!")
          window.location.href = "http://progrium.viewdocs.io/dokku/application-deployment";
        })
        .fail(function(data) {
          $("#result").html("Something went wrong...")
          $("#error-output").text(data.responseText)
        });
    }
    function update() {
      if ($("#vhost").is(":checked") && $("#hostname").val().match(/^(\d{1,3}\.){3}\d{1,3}$/)) {
        alert("In order to use virtualhost naming, the hostname must not be an IP but a valid domain name.")
        $("#vhost").prop('checked', false);
      }
      if ($("#vhost").is(':checked')) {
        $("#example").html("http://&lt;app-name&gt;."+$("#hostname").val())
      } else {
        $("#example").html("http://"+$("#hostname").val()+":&lt;app-port&gt;")
      }
    }
    $("#vhost").change(update);
    $("#hostname").change(update);
    update();
  </script>
</body>
</html>
"##;

/// Render the form with the probed defaults filled in.
///
/// Placeholders are substituted in a single pass over the template, so a
/// value is never scanned for further placeholders.
pub fn render(version: &str, admin_key: &str, hostname: &str) -> String {
    let mut out = String::with_capacity(TEMPLATE.len() + admin_key.len() + hostname.len());
    let mut rest = TEMPLATE;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rest = &rest[start..];
            break;
        };
        let value = match &after[..end] {
            "version" => version,
            "admin_key" => admin_key,
            "hostname" => hostname,
            _ => {
                out.push_str("{{");
                rest = after;
                continue;
            }
        };
        out.push_str(&escape(value));
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_fields() {
        let html = render("v0.3.17", "ssh-rsa AAAA admin@laptop", "dokku.me");
        assert!(html.contains("<small>v0.3.17</small>"));
        assert!(html.contains(r#"id="key">ssh-rsa AAAA admin@laptop</textarea>"#));
        assert!(html.contains(r#"name="hostname" value="dokku.me""#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_render_blank_fields() {
        let html = render("v0.3.17", "", "");
        assert!(html.contains(r#"id="key"></textarea>"#));
        assert!(html.contains(r#"value="""#));
    }

    #[test]
    fn test_render_escapes_markup() {
        let html = render("v1", "</textarea><script>x</script>", r#"a" onfocus="x"#);
        assert!(!html.contains("<script>x</script>"));
        assert!(html.contains("&lt;/textarea&gt;&lt;script&gt;"));
        assert!(html.contains(r#"value="a&quot; onfocus=&quot;x""#));
    }

    #[test]
    fn test_render_leaves_placeholders_in_values() {
        let html = render("v1", "ssh-rsa {{hostname}}", "dokku.me");
        assert!(html.contains(r#"id="key">ssh-rsa {{hostname}}</textarea>"#));
        assert!(!html.contains("ssh-rsa dokku.me</textarea>"));
        assert!(html.contains(r#"name="hostname" value="dokku.me""#));
    }
}
